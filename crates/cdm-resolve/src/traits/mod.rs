//! Trait resolution engine.
//!
//! # What This Pass Does
//!
//! Builds the [`ResolvedTraitSet`] of any object for a wrt document and a
//! [`TraitScope`]:
//!
//! - `InheritedOnly`: base chain plus exhibited traits (definitions), the
//!   target definition's traits (references), relationship and data type
//!   traits (attributes)
//! - `AppliedOnly`: use-site applied trait references
//! - `ElevatedOnly`: elevated traits surfaced from an entity's or group's
//!   resolved attributes; only computed once the phase enables it
//! - `All`: inherited, then elevated, then applied
//!
//! A trait definition's own set holds just itself: its base trait's argument
//! vector (taken from the resolved `extends` reference) followed by its own
//! parameter defaults. A trait reference copies that entry and binds its
//! arguments by name or ordinal, then applies type-check replacements.
//!
//! Sets are shared through `Arc`. A reference with no arguments hands out its
//! definition's set unchanged; merges copy a set only when they change it.

pub mod parameters;
pub mod set;

use std::collections::HashSet;
use std::sync::Arc;

use cdm_object_model::{
    ArgumentValue, DocId, ObjectData, ObjectId, RefKind, Reference, TraitDef,
};

pub use parameters::{
    ConstantTable, ParameterCollection, ParameterInfo, ParameterValue, ParameterValueSet,
};
pub use set::{merge_set_shared, merge_trait_shared, ResolvedTrait, ResolvedTraitSet, TraitSignature};

use crate::cache::{CacheKey, ResultKind, TraitScope};
use crate::error::Result;
use crate::resolver::Resolver;

impl<'a> Resolver<'a> {
    /// Argument-independent facts about a trait definition.
    ///
    /// Returns `None` for non-trait objects and for a definition whose
    /// `extends` chain loops back into itself.
    pub fn trait_signature(
        &mut self,
        trait_def: ObjectId,
        wrt: DocId,
    ) -> Result<Option<Arc<TraitSignature>>> {
        let Some(def) = self.data(trait_def).and_then(|d| d.as_trait()) else {
            return Ok(None);
        };
        let key = CacheKey::new(trait_def, wrt, ResultKind::TraitSignature);
        if let Some(hit) = self.ctx.cache.signature(&key) {
            return Ok(Some(hit));
        }
        let Some(signature) = self.guarded(key, |this| this.compute_signature(trait_def, def, wrt))? else {
            return Ok(None);
        };
        self.ctx.cache.insert_signature(key, signature.clone());
        Ok(Some(signature))
    }

    fn compute_signature(
        &mut self,
        trait_def: ObjectId,
        def: &'a TraitDef,
        wrt: DocId,
    ) -> Result<Arc<TraitSignature>> {
        let graph = self.graph;

        let base = match def.extends {
            Some(extends) => match self.reference_definition(extends, wrt)? {
                Some(base_def) => self.trait_signature(base_def, wrt)?,
                None => None,
            },
            None => None,
        };

        let own = def
            .parameters
            .iter()
            .filter_map(|&p| {
                let param = graph.data(p)?.as_parameter()?;
                Some(ParameterInfo {
                    id: p,
                    name: param.name.clone(),
                    required: param.required,
                    data_type: param.data_type,
                    default: param.default.clone(),
                })
            })
            .collect();
        let parameters = ParameterCollection::new(
            trait_def,
            &def.name,
            base.as_ref().map(|b| b.parameters.as_ref()),
            own,
        )?;

        let mut ancestry = vec![def.name.clone()];
        if let Some(base) = &base {
            ancestry.extend(base.ancestry.iter().cloned());
        }
        let appliers = self
            .ctx
            .appliers
            .get(&trait_def)
            .cloned()
            .unwrap_or_default();
        let modifies_attributes = def.modifies_attributes
            || base.as_ref().is_some_and(|b| b.modifies_attributes)
            || !appliers.is_empty();
        let elevated = def.elevated || base.as_ref().is_some_and(|b| b.elevated);

        Ok(Arc::new(TraitSignature {
            id: trait_def,
            name: def.name.clone(),
            ancestry,
            parameters: Arc::new(parameters),
            elevated,
            modifies_attributes,
            appliers,
        }))
    }

    /// Resolve the traits of `object` for one scope.
    ///
    /// # Returns
    ///
    /// `None` only for [`TraitScope::ElevatedOnly`] before elevated traits are
    /// enabled. A re-entrant request (inheritance cycle) yields an empty,
    /// uncached set.
    pub fn resolve_traits(
        &mut self,
        object: ObjectId,
        wrt: DocId,
        scope: TraitScope,
    ) -> Result<Option<Arc<ResolvedTraitSet>>> {
        if scope == TraitScope::ElevatedOnly && !self.phase.elevated_enabled {
            return Ok(None);
        }
        let key = CacheKey::new(object, wrt, ResultKind::Traits(scope));
        if let Some(hit) = self.ctx.cache.traits(&key) {
            return Ok(Some(hit));
        }
        let Some(set) = self.guarded(key, |this| this.compute_traits(object, wrt, scope))? else {
            return Ok(Some(Arc::default()));
        };
        self.ctx.cache.insert_traits(key, set.clone());
        Ok(Some(set))
    }

    /// The `All` scope, which is always computed.
    pub fn resolve_all_traits(&mut self, object: ObjectId, wrt: DocId) -> Result<Arc<ResolvedTraitSet>> {
        Ok(self
            .resolve_traits(object, wrt, TraitScope::All)?
            .unwrap_or_default())
    }

    fn compute_traits(
        &mut self,
        object: ObjectId,
        wrt: DocId,
        scope: TraitScope,
    ) -> Result<Arc<ResolvedTraitSet>> {
        let graph = self.graph;
        let Some(data) = graph.data(object) else {
            return Ok(Arc::default());
        };
        match scope {
            TraitScope::All => {
                let mut set = self
                    .resolve_traits(object, wrt, TraitScope::InheritedOnly)?
                    .unwrap_or_default();
                if let Some(elevated) = self.resolve_traits(object, wrt, TraitScope::ElevatedOnly)? {
                    merge_set_shared(&mut set, &elevated);
                }
                if let Some(applied) = self.resolve_traits(object, wrt, TraitScope::AppliedOnly)? {
                    merge_set_shared(&mut set, &applied);
                }
                Ok(set)
            }
            TraitScope::InheritedOnly => self.inherited_traits(object, data, wrt),
            TraitScope::AppliedOnly => self.merge_all_of(data.applied_traits(), wrt),
            TraitScope::ElevatedOnly => self.elevated_traits(object, data, wrt),
        }
    }

    fn inherited_traits(
        &mut self,
        object: ObjectId,
        data: &'a ObjectData,
        wrt: DocId,
    ) -> Result<Arc<ResolvedTraitSet>> {
        match data {
            ObjectData::Trait(_) => self.trait_definition_set(object, wrt),
            ObjectData::Reference(r) if r.kind == RefKind::Trait => {
                self.trait_reference_set(object, r, wrt)
            }
            ObjectData::Reference(_) => match self.reference_definition(object, wrt)? {
                Some(definition) => self.resolve_all_traits(definition, wrt),
                None => Ok(Arc::default()),
            },
            ObjectData::DataType(_)
            | ObjectData::Relationship(_)
            | ObjectData::AttributeGroup(_)
            | ObjectData::Entity(_) => {
                let sources: Vec<ObjectId> = data
                    .extends()
                    .into_iter()
                    .chain(data.exhibits_traits().iter().copied())
                    .collect();
                self.merge_all_of(&sources, wrt)
            }
            ObjectData::TypeAttribute(d) => {
                let sources: Vec<ObjectId> = d.relationship.into_iter().chain(d.data_type).collect();
                self.merge_all_of(&sources, wrt)
            }
            ObjectData::EntityAttribute(d) => {
                let sources: Vec<ObjectId> = d.relationship.into_iter().collect();
                self.merge_all_of(&sources, wrt)
            }
            ObjectData::ConstantEntity(d) => {
                let sources: Vec<ObjectId> = d.shape.into_iter().collect();
                self.merge_all_of(&sources, wrt)
            }
            ObjectData::Parameter(_) => Ok(Arc::default()),
        }
    }

    /// Merge the `All` sets of `sources` in order.
    fn merge_all_of(&mut self, sources: &[ObjectId], wrt: DocId) -> Result<Arc<ResolvedTraitSet>> {
        let mut set: Arc<ResolvedTraitSet> = Arc::default();
        for &source in sources {
            let other = self.resolve_all_traits(source, wrt)?;
            merge_set_shared(&mut set, &other);
        }
        Ok(set)
    }

    fn elevated_traits(
        &mut self,
        object: ObjectId,
        data: &ObjectData,
        wrt: DocId,
    ) -> Result<Arc<ResolvedTraitSet>> {
        if !matches!(data, ObjectData::Entity(_) | ObjectData::AttributeGroup(_)) {
            return Ok(Arc::default());
        }
        let mut set: Arc<ResolvedTraitSet> = Arc::default();
        let resolution = self.resolve_attributes(object, wrt)?;
        if let Some(attributes) = resolution.set() {
            for attribute in attributes.iter() {
                for t in attribute.traits().iter().filter(|t| t.signature.elevated) {
                    merge_trait_shared(&mut set, t);
                }
            }
        }
        Ok(set)
    }

    fn trait_definition_set(&mut self, trait_def: ObjectId, wrt: DocId) -> Result<Arc<ResolvedTraitSet>> {
        let Some(signature) = self.trait_signature(trait_def, wrt)? else {
            return Ok(Arc::default());
        };
        let extends = self
            .data(trait_def)
            .and_then(|d| d.as_trait())
            .and_then(|d| d.extends);

        let mut values = ParameterValueSet::default();
        if let Some(extends) = extends {
            let base_set = self.resolve_all_traits(extends, wrt)?;
            if let Some(base_def) = self.reference_definition(extends, wrt)? {
                if let Some(base) = base_set.get(base_def) {
                    values = base.values.clone();
                }
            }
        }

        let base_len = values.len();
        values.resize(signature.parameters.len());
        for index in base_len..signature.parameters.len() {
            let default = signature
                .parameters
                .get(index)
                .and_then(|p| p.default.clone());
            if let Some(default) = default {
                let value = self.argument_value(&default, wrt)?;
                values.set(index, Some(value), false);
            }
        }
        Ok(Arc::new(ResolvedTraitSet::single(ResolvedTrait {
            signature,
            values,
        })))
    }

    fn trait_reference_set(
        &mut self,
        reference: ObjectId,
        r: &Reference,
        wrt: DocId,
    ) -> Result<Arc<ResolvedTraitSet>> {
        let Some(definition) = self.reference_definition(reference, wrt)? else {
            return Ok(Arc::default());
        };
        let definition_set = self.resolve_all_traits(definition, wrt)?;
        let Some(entry) = definition_set.get(definition) else {
            return Ok(definition_set);
        };
        let parameters = entry.signature.parameters.clone();
        let has_replacements =
            (0..parameters.len()).any(|i| self.ctx.replacements.contains_key(&(reference, i)));
        if r.arguments.is_empty() && !has_replacements {
            return Ok(definition_set);
        }

        let mut resolved = entry.clone();
        for (ordinal, argument) in r.arguments.iter().enumerate() {
            let index = match &argument.name {
                Some(name) => parameters.resolve_name(name)?,
                None => parameters.resolve_ordinal(ordinal)?,
            };
            let value = self.argument_value(&argument.value, wrt)?;
            resolved.values.set(index, Some(value), true);
        }
        for index in 0..parameters.len() {
            if let Some(bound) = self.ctx.replacements.get(&(reference, index)) {
                resolved
                    .values
                    .set(index, Some(bound.value.clone()), bound.explicit);
            }
        }
        Ok(Arc::new(ResolvedTraitSet::single(resolved)))
    }

    /// Convert a literal argument into a resolved value.
    ///
    /// Objects that are (or reference) constant entities become tables.
    pub fn argument_value(&mut self, value: &ArgumentValue, wrt: DocId) -> Result<ParameterValue> {
        match value {
            ArgumentValue::Text(text) => Ok(ParameterValue::Text(text.clone())),
            ArgumentValue::Object(id) => Ok(match self.constant_table(*id, wrt)? {
                Some(table) => ParameterValue::Table(table),
                None => ParameterValue::Object(*id),
            }),
        }
    }

    fn constant_table(&mut self, object: ObjectId, wrt: DocId) -> Result<Option<Arc<ConstantTable>>> {
        let definition = match self.data(object) {
            Some(ObjectData::ConstantEntity(_)) => object,
            Some(ObjectData::Reference(r)) if r.kind == RefKind::Entity => {
                match self.reference_definition(object, wrt)? {
                    Some(definition) => definition,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
        let Some(table) = self.data(definition).and_then(|d| d.as_constant_entity()) else {
            return Ok(None);
        };
        let shape = match table.shape {
            Some(shape) => self.reference_definition(shape, wrt)?,
            None => None,
        };
        Ok(Some(Arc::new(ConstantTable {
            entity: definition,
            shape,
            rows: table.rows.clone(),
        })))
    }

    /// The definition a parameter value designates, if it designates one.
    pub fn value_definition(&mut self, value: &ParameterValue, wrt: DocId) -> Result<Option<ObjectId>> {
        match value {
            ParameterValue::Object(id) => match self.data(*id) {
                Some(ObjectData::Reference(_)) => self.reference_definition(*id, wrt),
                Some(_) => Ok(Some(*id)),
                None => Ok(None),
            },
            ParameterValue::Named { kind, name, from } => Ok(self
                .resolve_name(*kind, name, *from, wrt)?
                .map(|r| r.definition)),
            ParameterValue::Table(table) => Ok(Some(table.entity)),
            ParameterValue::Text(_) => Ok(None),
        }
    }

    /// Whether `object` is named `base_name` or extends (transitively) a
    /// definition that is.
    pub fn is_derived_from(&mut self, object: ObjectId, wrt: DocId, base_name: &str) -> Result<bool> {
        let mut current = match self.data(object) {
            Some(ObjectData::Reference(_)) => self.reference_definition(object, wrt)?,
            Some(_) => Some(object),
            None => None,
        };
        let mut visited = HashSet::new();
        while let Some(definition) = current {
            if !visited.insert(definition) {
                break;
            }
            let Some(data) = self.data(definition) else {
                break;
            };
            if data.name() == Some(base_name) {
                return Ok(true);
            }
            current = match data.extends() {
                Some(extends) => self.reference_definition(extends, wrt)?,
                None => None,
            };
        }
        Ok(false)
    }
}
