//! Trait applier registry.
//!
//! Appliers are behaviors bound to trait names. They inspect, mutate, delete,
//! or synthesize resolved attributes while an attribute definition is
//! resolved.
//!
//! # Architecture
//!
//! The registry uses [`linkme::distributed_slice`] for compile-time registration:
//!
//! 1. Appliers register themselves as statics in [`TRAIT_APPLIERS`]
//! 2. At link time, all registrations are collected into the slice
//! 3. The `traits` stage walks each trait definition's ancestry once and binds
//!    every applier whose `match_name` equals an ancestor's name
//!
//! Appliers can be defined in downstream crates and are picked up the same way
//! as the standard library in [`library`].
//!
//! # Callback Slots
//!
//! Every slot is optional:
//!
//! - `will_apply`: gate checked before any other slot runs
//! - `attribute_apply`: in-place mutation of one attribute
//! - `attribute_add`: synthesize one attribute, optionally asking to be called
//!   again through a [`ContinuationState`]
//! - `attribute_remove`: vote to delete an attribute in the final sweep

pub mod library;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;

use cdm_object_model::{DocId, ObjectData, ObjectId, RefKind};

use crate::attributes::ResolvedAttribute;
use crate::error::Result;
use crate::resolver::Resolver;
use crate::traits::{ParameterValue, ResolvedTrait, ResolvedTraitSet};

pub type WillApplyFn =
    fn(&mut ApplierContext<'_, '_>, &ResolvedTrait, Option<&ResolvedAttribute>) -> Result<bool>;
pub type AttributeApplyFn =
    fn(&mut ApplierContext<'_, '_>, &ResolvedTrait, &mut ResolvedAttribute) -> Result<()>;
pub type AttributeAddFn = fn(
    &mut ApplierContext<'_, '_>,
    &ResolvedTrait,
    Option<&ResolvedAttribute>,
    Option<ContinuationState>,
) -> Result<Option<Synthesized>>;
pub type AttributeRemoveFn =
    fn(&mut ApplierContext<'_, '_>, &ResolvedTrait, &ResolvedAttribute) -> Result<bool>;

/// Descriptor for a registered applier.
pub struct TraitApplier {
    /// Trait name this applier binds to (matched against the whole ancestry)
    pub match_name: &'static str,
    /// Higher runs first
    pub priority: i32,
    pub will_apply: Option<WillApplyFn>,
    pub attribute_apply: Option<AttributeApplyFn>,
    pub attribute_add: Option<AttributeAddFn>,
    pub attribute_remove: Option<AttributeRemoveFn>,
}

impl fmt::Debug for TraitApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitApplier")
            .field("match_name", &self.match_name)
            .field("priority", &self.priority)
            .field("apply", &self.attribute_apply.is_some())
            .field("add", &self.attribute_add.is_some())
            .field("remove", &self.attribute_remove.is_some())
            .finish()
    }
}

/// Distributed slice collecting all applier registrations.
#[distributed_slice]
pub static TRAIT_APPLIERS: [TraitApplier];

/// Get all registered applier names
pub fn all_names() -> impl Iterator<Item = &'static str> {
    TRAIT_APPLIERS.iter().map(|a| a.match_name)
}

/// Appliers bound to exactly this trait name, highest priority first.
pub fn for_name(name: &str) -> Vec<&'static TraitApplier> {
    let mut found: Vec<&'static TraitApplier> = TRAIT_APPLIERS
        .iter()
        .filter(|a| a.match_name == name)
        .collect();
    found.sort_by(|a, b| b.priority.cmp(&a.priority));
    found
}

/// Opaque state an applier hands back to be called again.
pub struct ContinuationState(Box<dyn Any + Send>);

impl ContinuationState {
    pub fn new<T: Any + Send>(state: T) -> Self {
        Self(Box::new(state))
    }

    /// Recover the applier's own state type.
    pub fn downcast<T: Any>(self) -> Option<T> {
        self.0.downcast::<T>().ok().map(|b| *b)
    }
}

impl fmt::Debug for ContinuationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContinuationState(..)")
    }
}

/// Output of one `attribute_add` call.
#[derive(Debug)]
pub struct Synthesized {
    pub attribute: ResolvedAttribute,
    pub continuation: Option<ContinuationState>,
}

impl Synthesized {
    pub fn done(attribute: ResolvedAttribute) -> Self {
        Self {
            attribute,
            continuation: None,
        }
    }
}

/// What an applier can see and resolve while it runs.
pub struct ApplierContext<'r, 'a> {
    resolver: &'r mut Resolver<'a>,
    pub wrt: DocId,
    /// The attribute definition being resolved.
    pub definition: ObjectId,
}

impl<'r, 'a> ApplierContext<'r, 'a> {
    pub(crate) fn new(resolver: &'r mut Resolver<'a>, wrt: DocId, definition: ObjectId) -> Self {
        Self {
            resolver,
            wrt,
            definition,
        }
    }

    /// Name of the definition being resolved.
    pub fn definition_name(&self) -> Option<&'a str> {
        self.resolver.data(self.definition).and_then(ObjectData::name)
    }

    /// The definition a parameter value designates.
    pub fn definition_of(&mut self, value: &ParameterValue) -> Result<Option<ObjectId>> {
        self.resolver.value_definition(value, self.wrt)
    }

    pub fn traits_of(&mut self, object: ObjectId) -> Result<Arc<ResolvedTraitSet>> {
        self.resolver.resolve_all_traits(object, self.wrt)
    }

    /// A fresh resolved attribute for an attribute definition: its name and
    /// its full trait set.
    pub fn attribute_from_definition(&mut self, definition: ObjectId) -> Result<Option<ResolvedAttribute>> {
        let Some(data) = self.resolver.data(definition) else {
            return Ok(None);
        };
        if !data.kind().is_attribute() {
            return Ok(None);
        }
        let Some(name) = data.name() else {
            return Ok(None);
        };
        let traits = self.traits_of(definition)?;
        Ok(Some(ResolvedAttribute::new(name, definition, traits)))
    }

    /// Resolve a trait-valued parameter to the trait it applies, arguments
    /// included.
    pub fn trait_from_value(&mut self, value: &ParameterValue) -> Result<Option<ResolvedTrait>> {
        let object = match value {
            ParameterValue::Object(id) => *id,
            ParameterValue::Named { .. } => match self.definition_of(value)? {
                Some(definition) => definition,
                None => return Ok(None),
            },
            ParameterValue::Text(name) => return self.trait_by_name(name),
            ParameterValue::Table(_) => return Ok(None),
        };
        let Some(definition) = self.resolver.value_definition(&ParameterValue::Object(object), self.wrt)? else {
            return Ok(None);
        };
        let set = self.traits_of(object)?;
        Ok(set.get(definition).cloned())
    }

    /// Resolve a trait by name as seen from the definition being resolved.
    pub fn trait_by_name(&mut self, name: &str) -> Result<Option<ResolvedTrait>> {
        let Some(found) =
            self.resolver
                .resolve_name(RefKind::Trait, name, self.definition.doc(), self.wrt)?
        else {
            return Ok(None);
        };
        let set = self.traits_of(found.definition)?;
        Ok(set.get(found.definition).cloned())
    }
}
