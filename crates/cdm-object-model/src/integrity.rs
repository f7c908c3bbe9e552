//! Minimal-shape checks per object kind.
//!
//! The integrity stage calls [`missing_fields`] on every object it visits and
//! reports one diagnostic per failing object.

use crate::object::{ObjectData, RefTarget};

/// Names of required fields that `data` lacks; empty when the object is valid.
pub fn missing_fields(data: &ObjectData) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let mut require = |present: bool, field: &'static str| {
        if !present {
            missing.push(field);
        }
    };
    match data {
        ObjectData::Trait(d) => require(!d.name.is_empty(), "traitName"),
        ObjectData::DataType(d) => require(!d.name.is_empty(), "dataTypeName"),
        ObjectData::Relationship(d) => require(!d.name.is_empty(), "relationshipName"),
        ObjectData::AttributeGroup(d) => require(!d.name.is_empty(), "attributeGroupName"),
        ObjectData::Entity(d) => require(!d.name.is_empty(), "entityName"),
        ObjectData::ConstantEntity(d) => require(d.shape.is_some(), "entityShape"),
        ObjectData::TypeAttribute(d) => {
            require(d.relationship.is_some(), "relationship");
            require(!d.name.is_empty(), "name");
            require(d.data_type.is_some(), "dataType");
        }
        ObjectData::EntityAttribute(d) => {
            require(d.relationship.is_some(), "relationship");
            require(!d.entities.is_empty(), "entity");
        }
        ObjectData::Parameter(d) => require(!d.name.is_empty(), "name"),
        ObjectData::Reference(r) => {
            if let RefTarget::Named(name) = &r.target {
                require(!name.is_empty(), "namedReference");
            }
        }
    }
    missing
}
