//! Entity reference discovery.
//!
//! An entity attribute whose relationship carries `does.referenceEntity` (or
//! a trait derived from it) links the owning entity to each target entity.
//! The referencing side lists the supporting attributes synthesized for the
//! `addedAttribute` parameter; each referenced side lists the attribute named
//! by the target's `is.identifiedBy` trait.

use std::collections::HashSet;
use std::sync::Arc;

use cdm_object_model::{Diagnostic, DocId, ErrorKind, ObjectData, ObjectId};

use crate::attributes::ResolvedAttribute;
use crate::cache::{CacheKey, ResultKind};
use crate::error::Result;
use crate::references::RESOLVED_ATTRIBUTES;
use crate::resolver::Resolver;

/// One end of an entity reference.
#[derive(Debug, Clone)]
pub struct ResolvedEntityReferenceSide {
    pub entity: ObjectId,
    pub attributes: Vec<ResolvedAttribute>,
}

impl ResolvedEntityReferenceSide {
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .map(|a| a.resolved_name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedEntityReference {
    pub referencing: ResolvedEntityReferenceSide,
    pub referenced: Vec<ResolvedEntityReferenceSide>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedEntityReferenceSet {
    pub references: Vec<ResolvedEntityReference>,
}

impl ResolvedEntityReferenceSet {
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntityReference> {
        self.references.iter()
    }
}

/// Attribute name a `is.identifiedBy` argument designates.
fn identifying_attribute_name(value: &str) -> &str {
    let marker = format!("/{}/", RESOLVED_ATTRIBUTES);
    match value.rfind(&marker) {
        Some(at) => &value[at + marker.len()..],
        None => value.rsplit('/').next().unwrap_or(value),
    }
}

impl<'a> Resolver<'a> {
    /// Entity references of an entity for `wrt`; empty for anything else.
    pub fn resolve_entity_references(
        &mut self,
        entity: ObjectId,
        wrt: DocId,
    ) -> Result<Arc<ResolvedEntityReferenceSet>> {
        let entity = match self.data(entity) {
            Some(ObjectData::Reference(_)) => match self.reference_definition(entity, wrt)? {
                Some(definition) => definition,
                None => return Ok(Arc::default()),
            },
            Some(ObjectData::Entity(_)) => entity,
            _ => return Ok(Arc::default()),
        };
        let key = CacheKey::new(entity, wrt, ResultKind::EntityReferences);
        if let Some(hit) = self.ctx.cache.entity_references(&key) {
            return Ok(hit);
        }
        let Some(set) = self.guarded(key, |this| this.compute_entity_references(entity, wrt))? else {
            return Ok(Arc::default());
        };
        let set = Arc::new(set);
        self.ctx.cache.insert_entity_references(key, set.clone());
        Ok(set)
    }

    fn compute_entity_references(
        &mut self,
        entity: ObjectId,
        wrt: DocId,
    ) -> Result<ResolvedEntityReferenceSet> {
        let Some(def) = self.data(entity).and_then(ObjectData::as_entity) else {
            return Ok(ResolvedEntityReferenceSet::default());
        };
        let mut set = ResolvedEntityReferenceSet::default();

        if let Some(extends) = def.extends {
            let base = self.resolve_entity_references(extends, wrt)?;
            for inherited in base.iter() {
                let mut reference = inherited.clone();
                reference.referencing.entity = entity;
                set.references.push(reference);
            }
        }

        let mut entity_attributes = Vec::new();
        let mut visited = HashSet::new();
        self.collect_entity_attributes(&def.attributes, wrt, &mut visited, &mut entity_attributes)?;

        for attribute in entity_attributes {
            if let Some(reference) = self.entity_reference_of(entity, attribute, wrt)? {
                set.references.push(reference);
            }
        }
        tracing::trace!(%entity, count = set.len(), "entity references resolved");
        Ok(set)
    }

    /// Entity attributes among `members`, looking through attribute groups.
    fn collect_entity_attributes(
        &mut self,
        members: &[ObjectId],
        wrt: DocId,
        visited: &mut HashSet<ObjectId>,
        out: &mut Vec<ObjectId>,
    ) -> Result<()> {
        for &member in members {
            let target = match self.data(member) {
                Some(ObjectData::Reference(_)) => self.reference_definition(member, wrt)?,
                Some(_) => Some(member),
                None => None,
            };
            let Some(target) = target else {
                continue;
            };
            match self.data(target) {
                Some(ObjectData::EntityAttribute(_)) => out.push(target),
                Some(ObjectData::AttributeGroup(group)) if visited.insert(target) => {
                    self.collect_entity_attributes(&group.members, wrt, visited, out)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn entity_reference_of(
        &mut self,
        entity: ObjectId,
        attribute: ObjectId,
        wrt: DocId,
    ) -> Result<Option<ResolvedEntityReference>> {
        let Some(def) = self.data(attribute).and_then(|d| match d {
            ObjectData::EntityAttribute(def) => Some(def),
            _ => None,
        }) else {
            return Ok(None);
        };
        let traits = self.resolve_all_traits(attribute, wrt)?;
        let Some(marker) = traits.find_derived("does.referenceEntity") else {
            return Ok(None);
        };
        let added = match marker.value("addedAttribute").cloned() {
            Some(value) => self.value_definition(&value, wrt)?,
            None => None,
        };

        let resolved = self.resolve_attributes(attribute, wrt)?.into_set();
        let referencing = ResolvedEntityReferenceSide {
            entity,
            attributes: resolved
                .iter()
                .filter(|a| Some(a.target) == added)
                .cloned()
                .collect(),
        };

        let mut referenced = Vec::new();
        for &target in &def.entities {
            let Some(target) = self.reference_definition(target, wrt)? else {
                continue;
            };
            referenced.push(self.referenced_side(target, wrt)?);
        }
        Ok(Some(ResolvedEntityReference {
            referencing,
            referenced,
        }))
    }

    fn referenced_side(&mut self, entity: ObjectId, wrt: DocId) -> Result<ResolvedEntityReferenceSide> {
        let traits = self.resolve_all_traits(entity, wrt)?;
        let identifying = traits
            .find_derived("is.identifiedBy")
            .and_then(|t| t.text("attribute"))
            .map(str::to_string);
        let mut side = ResolvedEntityReferenceSide {
            entity,
            attributes: Vec::new(),
        };
        let Some(identifying) = identifying else {
            return Ok(side);
        };

        let attributes = self.resolve_attributes(entity, wrt)?.into_set();
        let name = identifying_attribute_name(&identifying);
        match attributes.get(name) {
            Some(attribute) => side.attributes.push(attribute.clone()),
            None => {
                let path = self.path_of(entity);
                self.report(Diagnostic::new(
                    ErrorKind::UnresolvedReference,
                    path,
                    format!("identifying attribute '{identifying}' not found"),
                ));
            }
        }
        Ok(side)
    }
}
