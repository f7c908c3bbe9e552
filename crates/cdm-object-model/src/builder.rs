//! Convenience construction of document contents.
//!
//! Loaders and tests build documents through [`DocumentBuilder`] instead of
//! wiring reference nodes by hand.
//!
//! # Examples
//!
//! ```
//! # use cdm_object_model::{ObjectGraph, DocumentBuilder, EntityDef};
//! let mut graph = ObjectGraph::new();
//! let doc = graph.create_document("/", "a.cdm.json");
//! let mut b = DocumentBuilder::new(graph.document_mut(doc).unwrap());
//! let name = b.type_attribute("name", "hasA", "string", &[]);
//! b.definition(EntityDef::new("Account").with_attribute(name));
//! ```

use crate::document::Document;
use crate::foundation::ObjectId;
use crate::object::{
    Argument, ConstantEntityDef, EntityAttributeDef, ObjectData, RefKind, Reference,
    TypeAttributeDef,
};

pub struct DocumentBuilder<'a> {
    doc: &'a mut Document,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc }
    }

    pub fn import(&mut self, uri: &str, moniker: Option<&str>) -> &mut Self {
        self.doc.add_import(uri, moniker);
        self
    }

    /// Add a top-level definition.
    pub fn definition(&mut self, data: impl Into<ObjectData>) -> ObjectId {
        self.doc.add_definition(data)
    }

    /// Add a nested object (parameter, attribute, inline definition).
    pub fn object(&mut self, data: impl Into<ObjectData>) -> ObjectId {
        self.doc.add_object(data)
    }

    pub fn named_ref(&mut self, kind: RefKind, name: &str) -> ObjectId {
        self.doc.add_object(Reference::named(kind, name))
    }

    pub fn trait_ref(&mut self, name: &str) -> ObjectId {
        self.named_ref(RefKind::Trait, name)
    }

    /// A trait reference with arguments.
    pub fn trait_ref_with(&mut self, name: &str, arguments: Vec<Argument>) -> ObjectId {
        self.doc
            .add_object(Reference::named(RefKind::Trait, name).with_arguments(arguments))
    }

    pub fn data_type_ref(&mut self, name: &str) -> ObjectId {
        self.named_ref(RefKind::DataType, name)
    }

    pub fn relationship_ref(&mut self, name: &str) -> ObjectId {
        self.named_ref(RefKind::Relationship, name)
    }

    pub fn entity_ref(&mut self, name: &str) -> ObjectId {
        self.named_ref(RefKind::Entity, name)
    }

    pub fn attribute_group_ref(&mut self, name: &str) -> ObjectId {
        self.named_ref(RefKind::AttributeGroup, name)
    }

    /// Wrap an inline definition in an explicit reference.
    pub fn explicit_ref(&mut self, kind: RefKind, data: impl Into<ObjectData>) -> ObjectId {
        let definition = self.doc.add_object(data);
        self.doc.add_object(Reference::explicit(kind, definition))
    }

    /// An anonymous constant table shaped by the named entity, wrapped in an
    /// explicit entity reference ready to be used as an argument.
    pub fn constant_table(&mut self, shape: &str, rows: &[&[&str]]) -> ObjectId {
        let shape = self.entity_ref(shape);
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        self.explicit_ref(RefKind::Entity, ConstantEntityDef::new(shape, rows))
    }

    /// A type attribute with named relationship and data type references.
    pub fn type_attribute(
        &mut self,
        name: &str,
        relationship: &str,
        data_type: &str,
        traits: &[ObjectId],
    ) -> ObjectId {
        let relationship = self.relationship_ref(relationship);
        let data_type = self.data_type_ref(data_type);
        let mut attribute = TypeAttributeDef::new(name, relationship, data_type);
        attribute.applied_traits.extend_from_slice(traits);
        self.doc.add_object(attribute)
    }

    /// An entity attribute pointing at one named entity.
    pub fn entity_attribute(
        &mut self,
        name: &str,
        relationship: ObjectId,
        entity: &str,
        traits: &[ObjectId],
    ) -> ObjectId {
        let entity = self.entity_ref(entity);
        let mut attribute = EntityAttributeDef::new(name, relationship, entity);
        attribute.applied_traits.extend_from_slice(traits);
        self.doc.add_object(attribute)
    }
}
