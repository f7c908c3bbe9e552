//! Object graph node types.
//!
//! Every node in a document is a [`CdmObject`]: an id, a kind-specific
//! payload ([`ObjectData`]) and the paths stamped on it by the declaration
//! pass. Kind dispatch is an exhaustive `match` over [`ObjectKind`]; there is
//! no class hierarchy.

pub mod definition;
pub mod reference;

pub use definition::{
    AttributeGroupDef, ConstantEntityDef, DataTypeDef, EntityAttributeDef, EntityDef,
    ParameterDef, RelationshipDef, TraitDef, TypeAttributeDef,
};
pub use reference::{Argument, ArgumentValue, RefKind, RefTarget, Reference};

use serde::{Deserialize, Serialize};

use crate::foundation::ObjectId;

/// Closed set of object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    TraitDef,
    DataTypeDef,
    RelationshipDef,
    AttributeGroupDef,
    EntityDef,
    ConstantEntityDef,
    TypeAttributeDef,
    EntityAttributeDef,
    ParameterDef,
    TraitRef,
    DataTypeRef,
    RelationshipRef,
    AttributeGroupRef,
    EntityRef,
    AttributeRef,
}

impl ObjectKind {
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ObjectKind::TraitRef
                | ObjectKind::DataTypeRef
                | ObjectKind::RelationshipRef
                | ObjectKind::AttributeGroupRef
                | ObjectKind::EntityRef
                | ObjectKind::AttributeRef
        )
    }

    /// Type and entity attribute definitions.
    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            ObjectKind::TypeAttributeDef | ObjectKind::EntityAttributeDef
        )
    }

    /// Label used in walk paths for unnamed nodes.
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::TraitDef => "traitDef",
            ObjectKind::DataTypeDef => "dataTypeDef",
            ObjectKind::RelationshipDef => "relationshipDef",
            ObjectKind::AttributeGroupDef => "attributeGroupDef",
            ObjectKind::EntityDef => "entityDef",
            ObjectKind::ConstantEntityDef => "constantEntityDef",
            ObjectKind::TypeAttributeDef => "typeAttributeDef",
            ObjectKind::EntityAttributeDef => "entityAttributeDef",
            ObjectKind::ParameterDef => "parameterDef",
            ObjectKind::TraitRef => "traitRef",
            ObjectKind::DataTypeRef => "dataTypeRef",
            ObjectKind::RelationshipRef => "relationshipRef",
            ObjectKind::AttributeGroupRef => "attributeGroupRef",
            ObjectKind::EntityRef => "entityRef",
            ObjectKind::AttributeRef => "attributeRef",
        }
    }
}

/// Kind-specific payload of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectData {
    Trait(TraitDef),
    DataType(DataTypeDef),
    Relationship(RelationshipDef),
    AttributeGroup(AttributeGroupDef),
    Entity(EntityDef),
    ConstantEntity(ConstantEntityDef),
    TypeAttribute(TypeAttributeDef),
    EntityAttribute(EntityAttributeDef),
    Parameter(ParameterDef),
    Reference(Reference),
}

impl ObjectData {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectData::Trait(_) => ObjectKind::TraitDef,
            ObjectData::DataType(_) => ObjectKind::DataTypeDef,
            ObjectData::Relationship(_) => ObjectKind::RelationshipDef,
            ObjectData::AttributeGroup(_) => ObjectKind::AttributeGroupDef,
            ObjectData::Entity(_) => ObjectKind::EntityDef,
            ObjectData::ConstantEntity(_) => ObjectKind::ConstantEntityDef,
            ObjectData::TypeAttribute(_) => ObjectKind::TypeAttributeDef,
            ObjectData::EntityAttribute(_) => ObjectKind::EntityAttributeDef,
            ObjectData::Parameter(_) => ObjectKind::ParameterDef,
            ObjectData::Reference(r) => r.kind.reference_kind(),
        }
    }

    /// Declared name of a definition; `None` for references and unnamed defs.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            ObjectData::Trait(d) => &d.name,
            ObjectData::DataType(d) => &d.name,
            ObjectData::Relationship(d) => &d.name,
            ObjectData::AttributeGroup(d) => &d.name,
            ObjectData::Entity(d) => &d.name,
            ObjectData::ConstantEntity(d) => &d.name,
            ObjectData::TypeAttribute(d) => &d.name,
            ObjectData::EntityAttribute(d) => &d.name,
            ObjectData::Parameter(d) => &d.name,
            ObjectData::Reference(_) => return None,
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    /// The `extends` reference of definitions that have one.
    pub fn extends(&self) -> Option<ObjectId> {
        match self {
            ObjectData::Trait(d) => d.extends,
            ObjectData::DataType(d) => d.extends,
            ObjectData::Relationship(d) => d.extends,
            ObjectData::Entity(d) => d.extends,
            _ => None,
        }
    }

    /// Exhibited trait references of data types, relationships, groups and entities.
    pub fn exhibits_traits(&self) -> &[ObjectId] {
        match self {
            ObjectData::DataType(d) => &d.exhibits_traits,
            ObjectData::Relationship(d) => &d.exhibits_traits,
            ObjectData::AttributeGroup(d) => &d.exhibits_traits,
            ObjectData::Entity(d) => &d.exhibits_traits,
            _ => &[],
        }
    }

    pub fn exhibits_traits_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        match self {
            ObjectData::DataType(d) => Some(&mut d.exhibits_traits),
            ObjectData::Relationship(d) => Some(&mut d.exhibits_traits),
            ObjectData::AttributeGroup(d) => Some(&mut d.exhibits_traits),
            ObjectData::Entity(d) => Some(&mut d.exhibits_traits),
            _ => None,
        }
    }

    /// Applied trait references of attributes and references.
    pub fn applied_traits(&self) -> &[ObjectId] {
        match self {
            ObjectData::TypeAttribute(d) => &d.applied_traits,
            ObjectData::EntityAttribute(d) => &d.applied_traits,
            ObjectData::Reference(r) => &r.applied_traits,
            _ => &[],
        }
    }

    pub fn applied_traits_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        match self {
            ObjectData::TypeAttribute(d) => Some(&mut d.applied_traits),
            ObjectData::EntityAttribute(d) => Some(&mut d.applied_traits),
            ObjectData::Reference(r) => Some(&mut r.applied_traits),
            _ => None,
        }
    }

    pub fn as_trait(&self) -> Option<&TraitDef> {
        match self {
            ObjectData::Trait(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterDef> {
        match self {
            ObjectData::Parameter(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityDef> {
        match self {
            ObjectData::Entity(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_constant_entity(&self) -> Option<&ConstantEntityDef> {
        match self {
            ObjectData::ConstantEntity(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            ObjectData::Reference(r) => Some(r),
            _ => None,
        }
    }
}

macro_rules! impl_from_payload {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ObjectData {
                fn from(payload: $ty) -> Self {
                    ObjectData::$variant(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    TraitDef => Trait,
    DataTypeDef => DataType,
    RelationshipDef => Relationship,
    AttributeGroupDef => AttributeGroup,
    EntityDef => Entity,
    ConstantEntityDef => ConstantEntity,
    TypeAttributeDef => TypeAttribute,
    EntityAttributeDef => EntityAttribute,
    ParameterDef => Parameter,
    Reference => Reference,
);

/// A node owned by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdmObject {
    pub id: ObjectId,
    pub data: ObjectData,
    /// Path inside the owning document (`Account/name`), set by the
    /// declaration pass for named definitions.
    pub declared_path: Option<String>,
    /// Absolute corpus path (`/core/a.cdm.json/Account/name`).
    pub corpus_path: Option<String>,
}

impl CdmObject {
    pub fn new(id: ObjectId, data: ObjectData) -> Self {
        Self {
            id,
            data,
            declared_path: None,
            corpus_path: None,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    pub fn name(&self) -> Option<&str> {
        self.data.name()
    }
}
