//! Resolved traits and copy-on-write trait sets.

use std::sync::Arc;

use indexmap::IndexMap;

use cdm_object_model::ObjectId;

use super::parameters::{ParameterCollection, ParameterValue, ParameterValueSet};
use crate::appliers::TraitApplier;
use crate::error::Result;

/// Everything about a trait definition that does not depend on arguments.
#[derive(Debug, Clone)]
pub struct TraitSignature {
    pub id: ObjectId,
    pub name: String,
    /// Own name first, then each base trait's name.
    pub ancestry: Vec<String>,
    pub parameters: Arc<ParameterCollection>,
    pub elevated: bool,
    /// Declared, inherited, or implied by bound appliers.
    pub modifies_attributes: bool,
    pub appliers: Vec<&'static TraitApplier>,
}

impl TraitSignature {
    /// Whether this trait is `name` or derives from it.
    pub fn is_derived_from(&self, name: &str) -> bool {
        self.ancestry.iter().any(|a| a == name)
    }
}

/// One trait with its argument vector.
#[derive(Debug, Clone)]
pub struct ResolvedTrait {
    pub signature: Arc<TraitSignature>,
    pub values: ParameterValueSet,
}

impl ResolvedTrait {
    pub fn new(signature: Arc<TraitSignature>) -> Self {
        let values = ParameterValueSet::with_len(signature.parameters.len());
        Self { signature, values }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn id(&self) -> ObjectId {
        self.signature.id
    }

    /// Value of a parameter by name; unknown names read as `None`.
    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        let index = self.signature.parameters.index_of(name)?;
        self.values.get(index)
    }

    /// Value of a parameter that must exist.
    ///
    /// # Errors
    ///
    /// Fails when the trait has no parameter called `name`.
    pub fn parameter_value(&self, name: &str) -> Result<Option<&ParameterValue>> {
        let index = self.signature.parameters.resolve_name(name)?;
        Ok(self.values.get(index))
    }

    /// Explicitly set a parameter that must exist.
    pub fn set_parameter_value(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        let index = self.signature.parameters.resolve_name(name)?;
        self.values.set(index, Some(value), true);
        Ok(())
    }

    /// Text of a parameter, for callers that only read literals.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(ParameterValue::as_text)
    }
}

/// Deduplicated (by trait identity), insertion-ordered traits.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTraitSet {
    traits: IndexMap<ObjectId, ResolvedTrait>,
}

impl ResolvedTraitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(resolved: ResolvedTrait) -> Self {
        let mut set = Self::default();
        set.traits.insert(resolved.id(), resolved);
        set
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTrait> {
        self.traits.values()
    }

    pub fn get(&self, trait_def: ObjectId) -> Option<&ResolvedTrait> {
        self.traits.get(&trait_def)
    }

    /// Trait with exactly this name.
    pub fn find(&self, name: &str) -> Option<&ResolvedTrait> {
        self.iter().find(|t| t.name() == name)
    }

    /// First trait named `name` or derived from it.
    pub fn find_derived(&self, name: &str) -> Option<&ResolvedTrait> {
        self.iter().find(|t| t.signature.is_derived_from(name))
    }

    /// Remove every trait named `name` or derived from it.
    pub fn remove_derived(&mut self, name: &str) -> bool {
        let before = self.traits.len();
        self.traits.retain(|_, t| !t.signature.is_derived_from(name));
        before != self.traits.len()
    }

    /// Merge one trait in place.
    ///
    /// # Returns
    ///
    /// `true` if the set changed.
    pub fn merge(&mut self, incoming: &ResolvedTrait) -> bool {
        match self.traits.get_mut(&incoming.id()) {
            None => {
                self.traits.insert(incoming.id(), incoming.clone());
                true
            }
            Some(existing) => match existing.values.merged_with(&incoming.values) {
                Some(values) => {
                    existing.values = values;
                    true
                }
                None => false,
            },
        }
    }

    pub fn merge_set(&mut self, other: &ResolvedTraitSet) -> bool {
        let mut changed = false;
        for t in other.iter() {
            changed |= self.merge(t);
        }
        changed
    }
}

/// Merge one trait into a shared set, copying it only if it changes.
pub fn merge_trait_shared(target: &mut Arc<ResolvedTraitSet>, incoming: &ResolvedTrait) -> bool {
    let update = match target.traits.get(&incoming.id()) {
        None => Some(incoming.clone()),
        Some(existing) => existing
            .values
            .merged_with(&incoming.values)
            .map(|values| ResolvedTrait {
                signature: existing.signature.clone(),
                values,
            }),
    };
    match update {
        Some(resolved) => {
            Arc::make_mut(target).traits.insert(resolved.id(), resolved);
            true
        }
        None => false,
    }
}

/// Merge `other` into a shared set, copying it only if it changes.
///
/// An empty target simply takes over `other`'s handle.
pub fn merge_set_shared(target: &mut Arc<ResolvedTraitSet>, other: &Arc<ResolvedTraitSet>) -> bool {
    if other.is_empty() || Arc::ptr_eq(target, other) {
        return false;
    }
    if target.is_empty() {
        *target = other.clone();
        return true;
    }
    let mut changed = false;
    for t in other.iter() {
        changed |= merge_trait_shared(target, t);
    }
    changed
}
