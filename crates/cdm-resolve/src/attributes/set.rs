//! Resolved attributes and name-keyed attribute sets.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use cdm_object_model::ObjectId;

use super::properties::ResolvedAttributeProperties;
use crate::traits::{merge_set_shared, ResolvedTraitSet};

/// One attribute after inheritance and applier processing.
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    pub resolved_name: String,
    /// Name before any rename applier ran.
    pub previous_resolved_name: String,
    /// The attribute definition this attribute was derived from.
    pub target: ObjectId,
    pub insert_order: usize,
    traits: Arc<ResolvedTraitSet>,
    properties: OnceLock<ResolvedAttributeProperties>,
}

impl ResolvedAttribute {
    pub fn new(name: impl Into<String>, target: ObjectId, traits: Arc<ResolvedTraitSet>) -> Self {
        let name = name.into();
        Self {
            previous_resolved_name: name.clone(),
            resolved_name: name,
            target,
            insert_order: 0,
            traits,
            properties: OnceLock::new(),
        }
    }

    pub fn traits(&self) -> &Arc<ResolvedTraitSet> {
        &self.traits
    }

    /// Mutable access to the trait handle; cached properties are dropped.
    pub fn traits_mut(&mut self) -> &mut Arc<ResolvedTraitSet> {
        self.properties = OnceLock::new();
        &mut self.traits
    }

    /// Derived properties, computed from the traits on first use.
    pub fn properties(&self) -> &ResolvedAttributeProperties {
        self.properties
            .get_or_init(|| ResolvedAttributeProperties::from_traits(&self.traits))
    }
}

/// Query term for [`ResolvedAttributeSet::attributes_with_traits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitSpec {
    pub trait_name: String,
    /// Parameter name → required text value.
    pub parameters: Vec<(String, String)>,
}

impl TraitSpec {
    pub fn new(trait_name: impl Into<String>) -> Self {
        Self {
            trait_name: trait_name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }
}

impl From<&str> for TraitSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Name-keyed, insertion-ordered attributes.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttributeSet {
    attributes: IndexMap<String, ResolvedAttribute>,
    inherited_count: Option<usize>,
    next_order: usize,
    /// Trait name (including ancestors) → attribute names carrying it.
    trait_index: OnceLock<HashMap<String, Vec<String>>>,
}

impl ResolvedAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAttribute> {
        self.attributes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResolvedAttribute> {
        self.trait_index = OnceLock::new();
        self.attributes.values_mut()
    }

    /// Number of attributes that came from the base entity, once marked.
    pub fn inherited_attribute_count(&self) -> Option<usize> {
        self.inherited_count
    }

    pub(crate) fn mark_inherited(&mut self) {
        self.inherited_count = Some(self.attributes.len());
    }

    /// Merge one attribute: a new name is appended, an existing name gets the
    /// incoming traits merged in and takes the incoming target.
    pub fn merge(&mut self, mut attribute: ResolvedAttribute) -> bool {
        self.trait_index = OnceLock::new();
        match self.attributes.get_mut(&attribute.resolved_name) {
            Some(existing) => {
                let mut traits = existing.traits.clone();
                let changed = merge_set_shared(&mut traits, &attribute.traits);
                let retarget = existing.target != attribute.target;
                if changed {
                    *existing.traits_mut() = traits;
                }
                if retarget {
                    existing.target = attribute.target;
                }
                changed || retarget
            }
            None => {
                attribute.insert_order = self.next_order;
                self.next_order += 1;
                self.attributes
                    .insert(attribute.resolved_name.clone(), attribute);
                true
            }
        }
    }

    pub fn merge_set(&mut self, other: &ResolvedAttributeSet) -> bool {
        let mut changed = false;
        for attribute in other.iter() {
            changed |= self.merge(attribute.clone());
        }
        changed
    }

    /// Re-key attributes whose resolved name changed in place.
    pub(crate) fn rekey(&mut self) {
        let attributes = std::mem::take(&mut self.attributes);
        for (_, attribute) in attributes {
            match self.attributes.get_mut(&attribute.resolved_name) {
                Some(existing) => {
                    let mut traits = existing.traits.clone();
                    if merge_set_shared(&mut traits, &attribute.traits) {
                        *existing.traits_mut() = traits;
                    }
                }
                None => {
                    self.attributes
                        .insert(attribute.resolved_name.clone(), attribute);
                }
            }
        }
        self.trait_index = OnceLock::new();
    }

    pub(crate) fn remove_where(&mut self, mut doomed: impl FnMut(&ResolvedAttribute) -> bool) {
        self.attributes.retain(|_, a| !doomed(a));
        self.trait_index = OnceLock::new();
    }

    fn trait_index(&self) -> &HashMap<String, Vec<String>> {
        self.trait_index.get_or_init(|| {
            let mut index: HashMap<String, Vec<String>> = HashMap::new();
            for (name, attribute) in &self.attributes {
                for t in attribute.traits.iter() {
                    for ancestor in &t.signature.ancestry {
                        let names = index.entry(ancestor.clone()).or_default();
                        if names.last() != Some(name) {
                            names.push(name.clone());
                        }
                    }
                }
            }
            index
        })
    }

    /// Attributes carrying every trait in `specs` (by name or ancestry), with
    /// matching parameter text where a spec lists parameters.
    pub fn attributes_with_traits(&self, specs: &[TraitSpec]) -> Vec<&ResolvedAttribute> {
        let Some((first, rest)) = specs.split_first() else {
            return Vec::new();
        };
        let index = self.trait_index();
        let candidates = |spec: &TraitSpec| -> Vec<&str> {
            index
                .get(&spec.trait_name)
                .map(|names| {
                    names
                        .iter()
                        .map(String::as_str)
                        .filter(|name| self.matches_spec(name, spec))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut selected = candidates(first);
        for spec in rest {
            let other = candidates(spec);
            selected.retain(|name| other.contains(name));
        }
        selected
            .into_iter()
            .filter_map(|name| self.attributes.get(name))
            .collect()
    }

    fn matches_spec(&self, name: &str, spec: &TraitSpec) -> bool {
        if spec.parameters.is_empty() {
            return true;
        }
        let Some(attribute) = self.attributes.get(name) else {
            return false;
        };
        attribute
            .traits
            .iter()
            .filter(|t| t.signature.is_derived_from(&spec.trait_name))
            .any(|t| {
                spec.parameters
                    .iter()
                    .all(|(param, value)| t.text(param) == Some(value.as_str()))
            })
    }
}

/// Outcome of an attribute resolution request.
#[derive(Debug, Clone)]
pub enum AttributeResolution {
    Resolved(Arc<ResolvedAttributeSet>),
    /// The definition is already being resolved further up the stack.
    Reentrant,
}

impl AttributeResolution {
    pub fn set(&self) -> Option<&Arc<ResolvedAttributeSet>> {
        match self {
            AttributeResolution::Resolved(set) => Some(set),
            AttributeResolution::Reentrant => None,
        }
    }

    /// The resolved set, or an empty one for a re-entrant request.
    pub fn into_set(self) -> Arc<ResolvedAttributeSet> {
        match self {
            AttributeResolution::Resolved(set) => set,
            AttributeResolution::Reentrant => Arc::default(),
        }
    }

    pub fn is_reentrant(&self) -> bool {
        matches!(self, AttributeResolution::Reentrant)
    }
}
