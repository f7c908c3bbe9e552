//! Attribute resolution engine.
//!
//! # What This Pass Does
//!
//! Builds the [`ResolvedAttributeSet`] of a definition for a wrt document:
//!
//! - type attribute: one attribute for itself
//! - entity attribute: the referenced entities' attributes, unless the
//!   relationship references the entity (then nothing is inherited and the
//!   supporting attribute is synthesized)
//! - attribute group: its members in order
//! - entity: the base entity's set, then its own attributes
//!
//! Attribute definitions then run the applier pipeline:
//!
//! 1. the definition's traits are merged into every attribute and in-place
//!    appliers run, highest priority first
//! 2. synthesis runs off a work queue; continuations go to the front of the
//!    queue, and a synthesized attribute's own adding traits go to the back
//! 3. a final sweep deletes every attribute an applier votes to remove
//!
//! Results are cached per (definition, wrt). A definition reached again while
//! it is being resolved yields [`AttributeResolution::Reentrant`].

pub mod properties;
pub mod set;

use std::collections::VecDeque;
use std::sync::Arc;

use cdm_object_model::{Diagnostic, DocId, ErrorKind, ObjectData, ObjectId, Severity};

pub use properties::{DataFormat, ResolvedAttributeProperties};
pub use set::{AttributeResolution, ResolvedAttribute, ResolvedAttributeSet, TraitSpec};

use crate::appliers::{ApplierContext, ContinuationState, Synthesized, TraitApplier};
use crate::cache::{CacheKey, ResultKind, TraitScope};
use crate::error::Result;
use crate::resolver::Resolver;
use crate::traits::{merge_set_shared, ResolvedTrait, ResolvedTraitSet};

/// One pending `attribute_add` call.
struct SynthesisTask {
    source: Option<ResolvedAttribute>,
    resolved: ResolvedTrait,
    applier: &'static TraitApplier,
    state: Option<ContinuationState>,
}

/// Which traits of an attribute that was already in the set may drive
/// appliers during one pipeline pass. Attributes synthesized in the pass
/// always use all of their traits.
#[derive(Clone, Copy)]
enum ApplierScope<'s> {
    All,
    /// Only the use-site traits a reference adds on top of its definition's
    /// already-processed attributes.
    Only(&'s ResolvedTraitSet),
}

impl ApplierScope<'_> {
    fn admits(&self, resolved: &ResolvedTrait) -> bool {
        match self {
            ApplierScope::All => true,
            ApplierScope::Only(traits) => traits.get(resolved.id()).is_some(),
        }
    }
}

/// (trait, applier) pairs from `traits` that have `slot`, highest priority
/// first. Ties keep trait order.
fn bound_appliers(
    traits: &ResolvedTraitSet,
    scope: ApplierScope<'_>,
    slot: impl Fn(&TraitApplier) -> bool,
) -> Vec<(ResolvedTrait, &'static TraitApplier)> {
    let mut pairs: Vec<(ResolvedTrait, &'static TraitApplier)> = traits
        .iter()
        .filter(|t| t.signature.modifies_attributes && scope.admits(t))
        .flat_map(|t| {
            t.signature
                .appliers
                .iter()
                .filter(|a| slot(a))
                .map(move |a| (t.clone(), *a))
        })
        .collect();
    pairs.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));
    pairs
}

fn adding_appliers(
    traits: &ResolvedTraitSet,
    scope: ApplierScope<'_>,
) -> Vec<(ResolvedTrait, &'static TraitApplier)> {
    bound_appliers(traits, scope, |a| a.attribute_add.is_some())
}

impl<'a> Resolver<'a> {
    /// Resolve the attributes of `object` for `wrt`.
    ///
    /// A reference without applied traits shares its definition's result.
    /// One with applied traits gets a copy of that result with the traits
    /// merged into every attribute and their appliers run, cached under the
    /// reference.
    pub fn resolve_attributes(&mut self, object: ObjectId, wrt: DocId) -> Result<AttributeResolution> {
        if let Some(ObjectData::Reference(_)) = self.data(object) {
            return self.resolve_reference_attributes(object, wrt);
        }
        let key = CacheKey::new(object, wrt, ResultKind::Attributes);
        if let Some(hit) = self.ctx.cache.attributes(&key) {
            return Ok(AttributeResolution::Resolved(hit));
        }
        let Some(set) = self.guarded(key, |this| this.compute_attributes(object, wrt))? else {
            return Ok(AttributeResolution::Reentrant);
        };
        let set = Arc::new(set);
        self.ctx.cache.insert_attributes(key, set.clone());
        Ok(AttributeResolution::Resolved(set))
    }

    fn resolve_reference_attributes(&mut self, reference: ObjectId, wrt: DocId) -> Result<AttributeResolution> {
        let Some(definition) = self.reference_definition(reference, wrt)? else {
            return Ok(AttributeResolution::Resolved(Arc::default()));
        };
        let applied = self
            .resolve_traits(reference, wrt, TraitScope::AppliedOnly)?
            .unwrap_or_default();
        if applied.is_empty() {
            return self.resolve_attributes(definition, wrt);
        }

        let key = CacheKey::new(reference, wrt, ResultKind::Attributes);
        if let Some(hit) = self.ctx.cache.attributes(&key) {
            return Ok(AttributeResolution::Resolved(hit));
        }
        let computed = self.guarded(key, |this| {
            let resolution = this.resolve_attributes(definition, wrt)?;
            let Some(base) = resolution.set() else {
                return Ok(None);
            };
            let copy = ResolvedAttributeSet::clone(base);
            this.run_appliers(reference, wrt, copy, &applied, ApplierScope::Only(&applied))
                .map(Some)
        })?;
        let Some(Some(set)) = computed else {
            return Ok(AttributeResolution::Reentrant);
        };
        tracing::trace!(%reference, %definition, applied = applied.len(), "use-site traits applied to attributes");
        let set = Arc::new(set);
        self.ctx.cache.insert_attributes(key, set.clone());
        Ok(AttributeResolution::Resolved(set))
    }

    fn compute_attributes(&mut self, object: ObjectId, wrt: DocId) -> Result<ResolvedAttributeSet> {
        let graph = self.graph;
        let Some(data) = graph.data(object) else {
            return Ok(ResolvedAttributeSet::new());
        };
        match data {
            ObjectData::TypeAttribute(def) => {
                let traits = self.resolve_all_traits(object, wrt)?;
                let mut set = ResolvedAttributeSet::new();
                set.merge(ResolvedAttribute::new(def.name.clone(), object, traits.clone()));
                self.run_appliers(object, wrt, set, &traits, ApplierScope::All)
            }
            ObjectData::EntityAttribute(def) => {
                let traits = self.resolve_all_traits(object, wrt)?;
                let mut set = ResolvedAttributeSet::new();
                if traits.find_derived("does.referenceEntity").is_none() {
                    for &entity in &def.entities {
                        let resolution = self.resolve_attributes(entity, wrt)?;
                        if let Some(entity_set) = resolution.set() {
                            set.merge_set(entity_set);
                        }
                    }
                }
                self.run_appliers(object, wrt, set, &traits, ApplierScope::All)
            }
            // Traits exhibited by a group or an entity describe the definition
            // itself; they are not applied to its attributes.
            ObjectData::AttributeGroup(def) => {
                self.merge_members(&def.members, wrt, ResolvedAttributeSet::new())
            }
            ObjectData::Entity(def) => {
                let mut set = ResolvedAttributeSet::new();
                if let Some(extends) = def.extends {
                    let resolution = self.resolve_attributes(extends, wrt)?;
                    if let Some(base) = resolution.set() {
                        set.merge_set(base);
                    }
                    set.mark_inherited();
                }
                self.merge_members(&def.attributes, wrt, set)
            }
            _ => Ok(ResolvedAttributeSet::new()),
        }
    }

    fn merge_members(
        &mut self,
        members: &[ObjectId],
        wrt: DocId,
        mut set: ResolvedAttributeSet,
    ) -> Result<ResolvedAttributeSet> {
        for &member in members {
            let resolution = self.resolve_attributes(member, wrt)?;
            if let Some(member_set) = resolution.set() {
                set.merge_set(member_set);
            }
        }
        Ok(set)
    }

    /// In-place pass, synthesis queue, then the removal sweep.
    ///
    /// `owner` is the definition or reference being resolved; `owner_traits`
    /// are merged into every attribute already in `set`.
    fn run_appliers(
        &mut self,
        owner: ObjectId,
        wrt: DocId,
        mut set: ResolvedAttributeSet,
        owner_traits: &Arc<ResolvedTraitSet>,
        scope: ApplierScope<'_>,
    ) -> Result<ResolvedAttributeSet> {
        for attribute in set.iter_mut() {
            let mut traits = attribute.traits().clone();
            if merge_set_shared(&mut traits, owner_traits) {
                *attribute.traits_mut() = traits;
            }
            self.apply_in_place(attribute, wrt, owner, scope)?;
        }
        set.rekey();

        self.synthesize(&mut set, owner_traits, wrt, owner, scope)?;
        self.remove_marked(&mut set, owner_traits, wrt, owner, scope)?;
        Ok(set)
    }

    fn apply_in_place(
        &mut self,
        attribute: &mut ResolvedAttribute,
        wrt: DocId,
        owner: ObjectId,
        scope: ApplierScope<'_>,
    ) -> Result<()> {
        let pairs = bound_appliers(attribute.traits(), scope, |a| a.attribute_apply.is_some());
        for (resolved, applier) in pairs {
            let mut ctx = ApplierContext::new(self, wrt, owner);
            if let Some(will_apply) = applier.will_apply {
                if !will_apply(&mut ctx, &resolved, Some(attribute))? {
                    continue;
                }
            }
            if let Some(apply) = applier.attribute_apply {
                apply(&mut ctx, &resolved, attribute)?;
            }
        }
        Ok(())
    }

    /// Priority of the strongest removal vote on `attribute`, if any applier
    /// votes to remove it.
    fn removal_vote(
        &mut self,
        attribute: &ResolvedAttribute,
        owner_traits: &Arc<ResolvedTraitSet>,
        wrt: DocId,
        owner: ObjectId,
        scope: ApplierScope<'_>,
    ) -> Result<Option<i32>> {
        let mut traits = attribute.traits().clone();
        merge_set_shared(&mut traits, owner_traits);
        for (resolved, applier) in bound_appliers(&traits, scope, |a| a.attribute_remove.is_some()) {
            let mut ctx = ApplierContext::new(self, wrt, owner);
            if let Some(will_apply) = applier.will_apply {
                if !will_apply(&mut ctx, &resolved, Some(attribute))? {
                    continue;
                }
            }
            let Some(remove) = applier.attribute_remove else {
                continue;
            };
            if remove(&mut ctx, &resolved, attribute)? {
                return Ok(Some(applier.priority));
            }
        }
        Ok(None)
    }

    /// Adding pairs seeded by `source`. An attribute voted out by an applier
    /// that outranks an adding applier does not seed it.
    fn seeds(
        &mut self,
        source: &ResolvedAttribute,
        pairs: Vec<(ResolvedTrait, &'static TraitApplier)>,
        owner_traits: &Arc<ResolvedTraitSet>,
        wrt: DocId,
        owner: ObjectId,
        scope: ApplierScope<'_>,
    ) -> Result<Vec<SynthesisTask>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let vote = self.removal_vote(source, owner_traits, wrt, owner, scope)?;
        let mut tasks = Vec::with_capacity(pairs.len());
        for (resolved, applier) in pairs {
            if vote.is_some_and(|priority| priority > applier.priority) {
                tracing::trace!(attribute = %source.resolved_name, applier = applier.match_name, "removed attribute does not seed synthesis");
                continue;
            }
            tasks.push(SynthesisTask {
                source: Some(source.clone()),
                resolved,
                applier,
                state: None,
            });
        }
        Ok(tasks)
    }

    fn synthesize(
        &mut self,
        set: &mut ResolvedAttributeSet,
        owner_traits: &Arc<ResolvedTraitSet>,
        wrt: DocId,
        owner: ObjectId,
        scope: ApplierScope<'_>,
    ) -> Result<()> {
        let mut queue: VecDeque<SynthesisTask> = VecDeque::new();
        if set.is_empty() {
            for (resolved, applier) in adding_appliers(owner_traits, scope) {
                queue.push_back(SynthesisTask {
                    source: None,
                    resolved,
                    applier,
                    state: None,
                });
            }
        } else {
            for attribute in set.iter() {
                let pairs = adding_appliers(attribute.traits(), scope);
                queue.extend(self.seeds(attribute, pairs, owner_traits, wrt, owner, scope)?);
            }
        }

        let limit = self.ctx.options().max_synthesized_attributes;
        let mut synthesized = 0usize;
        while let Some(task) = queue.pop_front() {
            let SynthesisTask {
                source,
                resolved,
                applier,
                state,
            } = task;
            let Some(add) = applier.attribute_add else {
                continue;
            };
            let mut ctx = ApplierContext::new(self, wrt, owner);
            if state.is_none() {
                if let Some(will_apply) = applier.will_apply {
                    if !will_apply(&mut ctx, &resolved, source.as_ref())? {
                        continue;
                    }
                }
            }
            let Some(Synthesized {
                mut attribute,
                continuation,
            }) = add(&mut ctx, &resolved, source.as_ref(), state)?
            else {
                continue;
            };

            synthesized += 1;
            if synthesized > limit {
                let path = self.path_of(owner);
                self.report(Diagnostic::with_severity(
                    ErrorKind::SynthesisLimit,
                    Severity::Error,
                    path,
                    format!("more than {limit} attributes synthesized; synthesis stopped"),
                ));
                break;
            }

            let generating = resolved.id();
            if let Some(state) = continuation {
                queue.push_front(SynthesisTask {
                    source,
                    resolved,
                    applier,
                    state: Some(state),
                });
            }

            self.apply_in_place(&mut attribute, wrt, owner, ApplierScope::All)?;
            let pairs: Vec<_> = adding_appliers(attribute.traits(), ApplierScope::All)
                .into_iter()
                .filter(|(resolved, _)| resolved.id() != generating)
                .collect();
            queue.extend(self.seeds(&attribute, pairs, owner_traits, wrt, owner, ApplierScope::All)?);
            tracing::trace!(owner = %owner, attribute = %attribute.resolved_name, "attribute synthesized");
            set.merge(attribute);
        }
        Ok(())
    }

    fn remove_marked(
        &mut self,
        set: &mut ResolvedAttributeSet,
        owner_traits: &Arc<ResolvedTraitSet>,
        wrt: DocId,
        owner: ObjectId,
        scope: ApplierScope<'_>,
    ) -> Result<()> {
        let mut doomed: Vec<String> = Vec::new();
        for attribute in set.iter() {
            if self.removal_vote(attribute, owner_traits, wrt, owner, scope)?.is_some() {
                doomed.push(attribute.resolved_name.clone());
            }
        }
        if !doomed.is_empty() {
            tracing::trace!(owner = %owner, removed = ?doomed, "attributes removed");
            set.remove_where(|a| doomed.contains(&a.resolved_name));
        }
        Ok(())
    }

    /// The trait set of one resolved attribute of an entity or group.
    pub fn attribute_traits(
        &mut self,
        object: ObjectId,
        wrt: DocId,
        attribute: &str,
    ) -> Result<Option<Arc<ResolvedTraitSet>>> {
        let resolution = self.resolve_attributes(object, wrt)?;
        Ok(resolution
            .set()
            .and_then(|s| s.get(attribute))
            .map(|a| a.traits().clone()))
    }
}
