//! Context-keyed memoization of resolution results.
//!
//! Every result is keyed by `(object, wrt document, result kind)`. The wrt
//! document is a plain [`DocId`], so the key is stable for the whole run and
//! cheap to hash.
//!
//! Entries are written once and read many times. They are only dropped by
//! explicit invalidation: a structural edit on one object, the applier
//! attachment in the traits stage, or the final stage clearing `All` trait
//! sets so elevated traits get folded in.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cdm_object_model::{DocId, ObjectId};

use crate::attributes::ResolvedAttributeSet;
use crate::entity_refs::ResolvedEntityReferenceSet;
use crate::references::ResolvedReference;
use crate::traits::{ResolvedTraitSet, TraitSignature};

/// Which slice of an object's traits is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitScope {
    All,
    InheritedOnly,
    AppliedOnly,
    ElevatedOnly,
}

/// Kind of cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Reference,
    TraitSignature,
    Traits(TraitScope),
    Attributes,
    EntityReferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub object: ObjectId,
    pub wrt: DocId,
    pub kind: ResultKind,
}

impl CacheKey {
    pub fn new(object: ObjectId, wrt: DocId, kind: ResultKind) -> Self {
        Self { object, wrt, kind }
    }
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    references: HashMap<(ObjectId, DocId), ResolvedReference>,
    signatures: HashMap<CacheKey, Arc<TraitSignature>>,
    traits: HashMap<CacheKey, Arc<ResolvedTraitSet>>,
    attributes: HashMap<CacheKey, Arc<ResolvedAttributeSet>>,
    entity_references: HashMap<CacheKey, Arc<ResolvedEntityReferenceSet>>,
    in_progress: HashSet<CacheKey>,
}

impl ResolutionCache {
    pub fn reference(&self, reference: ObjectId, wrt: DocId) -> Option<ResolvedReference> {
        self.references.get(&(reference, wrt)).copied()
    }

    pub fn insert_reference(&mut self, reference: ObjectId, wrt: DocId, value: ResolvedReference) {
        self.references.insert((reference, wrt), value);
    }

    pub fn signature(&self, key: &CacheKey) -> Option<Arc<TraitSignature>> {
        self.signatures.get(key).cloned()
    }

    pub fn insert_signature(&mut self, key: CacheKey, value: Arc<TraitSignature>) {
        self.signatures.insert(key, value);
    }

    pub fn traits(&self, key: &CacheKey) -> Option<Arc<ResolvedTraitSet>> {
        self.traits.get(key).cloned()
    }

    pub fn insert_traits(&mut self, key: CacheKey, value: Arc<ResolvedTraitSet>) {
        self.traits.insert(key, value);
    }

    pub fn attributes(&self, key: &CacheKey) -> Option<Arc<ResolvedAttributeSet>> {
        self.attributes.get(key).cloned()
    }

    pub fn insert_attributes(&mut self, key: CacheKey, value: Arc<ResolvedAttributeSet>) {
        self.attributes.insert(key, value);
    }

    pub fn entity_references(&self, key: &CacheKey) -> Option<Arc<ResolvedEntityReferenceSet>> {
        self.entity_references.get(key).cloned()
    }

    pub fn insert_entity_references(
        &mut self,
        key: CacheKey,
        value: Arc<ResolvedEntityReferenceSet>,
    ) {
        self.entity_references.insert(key, value);
    }

    /// Mark `key` as being computed.
    ///
    /// # Returns
    ///
    /// `false` when the computation is already on the stack (re-entrant call).
    pub fn enter(&mut self, key: CacheKey) -> bool {
        self.in_progress.insert(key)
    }

    /// Clear the in-progress mark of `key`.
    ///
    /// # Returns
    ///
    /// `false` when `key` was not marked, which means enter and leave calls
    /// are unbalanced.
    pub fn leave(&mut self, key: &CacheKey) -> bool {
        self.in_progress.remove(key)
    }

    /// Drop every result keyed by `object`, for every wrt document.
    pub fn invalidate_object(&mut self, object: ObjectId) {
        self.references.retain(|(id, _), _| *id != object);
        self.signatures.retain(|k, _| k.object != object);
        self.traits.retain(|k, _| k.object != object);
        self.attributes.retain(|k, _| k.object != object);
        self.entity_references.retain(|k, _| k.object != object);
    }

    /// Drop all trait sets of one scope.
    pub fn clear_trait_scope(&mut self, scope: TraitScope) {
        self.traits.retain(|k, _| k.kind != ResultKind::Traits(scope));
    }

    /// Drop everything derived from trait definitions; resolved references stay.
    pub fn clear_derived(&mut self) {
        self.signatures.clear();
        self.traits.clear();
        self.attributes.clear();
        self.entity_references.clear();
    }

    /// Number of cached results of `kind` (trait sets count across scopes
    /// when `kind` is any `Traits` scope).
    pub fn len_of(&self, kind: ResultKind) -> usize {
        match kind {
            ResultKind::Reference => self.references.len(),
            ResultKind::TraitSignature => self.signatures.len(),
            ResultKind::Traits(_) => self.traits.len(),
            ResultKind::Attributes => self.attributes.len(),
            ResultKind::EntityReferences => self.entity_references.len(),
        }
    }
}
