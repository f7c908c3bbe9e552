//! Definition node payloads.
//!
//! Cross-object links (`extends`, exhibited traits, members, ...) are
//! [`ObjectId`]s of reference or inline-definition nodes in the same graph.
//! An empty `name` means "missing"; the integrity pass reports it.

use crate::foundation::ObjectId;

use super::ArgumentValue;

/// A trait declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitDef {
    pub name: String,
    pub explanation: Option<String>,
    /// Trait reference to the base trait.
    pub extends: Option<ObjectId>,
    /// Parameter definitions declared by this trait (base parameters come first
    /// in the full collection).
    pub parameters: Vec<ObjectId>,
    /// Surfaced onto an owning entity from deep inside its attributes.
    pub elevated: bool,
    /// Marks a trait whose appliers change attributes; inherited by derived traits.
    pub modifies_attributes: bool,
}

impl TraitDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_extends(mut self, trait_ref: ObjectId) -> Self {
        self.extends = Some(trait_ref);
        self
    }

    pub fn with_parameter(mut self, parameter: ObjectId) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn with_modifies_attributes(mut self) -> Self {
        self.modifies_attributes = true;
        self
    }
}

/// A trait parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDef {
    pub name: String,
    pub explanation: Option<String>,
    pub default: Option<ArgumentValue>,
    pub required: bool,
    /// Data type reference; object types (`entity`, `attribute`, ...) trigger
    /// the constant type check.
    pub data_type: Option<ObjectId>,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<ArgumentValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_data_type(mut self, data_type_ref: ObjectId) -> Self {
        self.data_type = Some(data_type_ref);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A data type declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTypeDef {
    pub name: String,
    pub explanation: Option<String>,
    pub extends: Option<ObjectId>,
    pub exhibits_traits: Vec<ObjectId>,
}

impl DataTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_extends(mut self, data_type_ref: ObjectId) -> Self {
        self.extends = Some(data_type_ref);
        self
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.exhibits_traits.push(trait_ref);
        self
    }
}

/// A relationship declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipDef {
    pub name: String,
    pub explanation: Option<String>,
    pub extends: Option<ObjectId>,
    pub exhibits_traits: Vec<ObjectId>,
}

impl RelationshipDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_extends(mut self, relationship_ref: ObjectId) -> Self {
        self.extends = Some(relationship_ref);
        self
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.exhibits_traits.push(trait_ref);
        self
    }
}

/// A named, reusable group of attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeGroupDef {
    pub name: String,
    pub explanation: Option<String>,
    /// Attribute definitions or attribute group references, in declaration order.
    pub members: Vec<ObjectId>,
    pub exhibits_traits: Vec<ObjectId>,
}

impl AttributeGroupDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_member(mut self, member: ObjectId) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.exhibits_traits.push(trait_ref);
        self
    }
}

/// An entity declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub explanation: Option<String>,
    pub extends: Option<ObjectId>,
    pub exhibits_traits: Vec<ObjectId>,
    /// Attribute definitions or attribute group references, in declaration order.
    pub attributes: Vec<ObjectId>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_extends(mut self, entity_ref: ObjectId) -> Self {
        self.extends = Some(entity_ref);
        self
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.exhibits_traits.push(trait_ref);
        self
    }

    pub fn with_attribute(mut self, attribute: ObjectId) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// A small inline table of strings whose columns follow an entity shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantEntityDef {
    /// Empty for anonymous inline tables.
    pub name: String,
    pub explanation: Option<String>,
    /// Entity reference describing the columns.
    pub shape: Option<ObjectId>,
    pub rows: Vec<Vec<String>>,
}

impl ConstantEntityDef {
    pub fn new(shape: ObjectId, rows: Vec<Vec<String>>) -> Self {
        Self {
            shape: Some(shape),
            rows,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// An attribute whose value has a data type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeAttributeDef {
    pub name: String,
    pub explanation: Option<String>,
    pub relationship: Option<ObjectId>,
    pub data_type: Option<ObjectId>,
    pub applied_traits: Vec<ObjectId>,
}

impl TypeAttributeDef {
    pub fn new(name: impl Into<String>, relationship: ObjectId, data_type: ObjectId) -> Self {
        Self {
            name: name.into(),
            relationship: Some(relationship),
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.applied_traits.push(trait_ref);
        self
    }
}

/// An attribute whose value is one or more other entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAttributeDef {
    pub name: String,
    pub explanation: Option<String>,
    pub relationship: Option<ObjectId>,
    /// Entity references; more than one describes a polymorphic target.
    pub entities: Vec<ObjectId>,
    pub applied_traits: Vec<ObjectId>,
}

impl EntityAttributeDef {
    pub fn new(name: impl Into<String>, relationship: ObjectId, entity: ObjectId) -> Self {
        Self {
            name: name.into(),
            relationship: Some(relationship),
            entities: vec![entity],
            ..Self::default()
        }
    }

    pub fn with_entity(mut self, entity_ref: ObjectId) -> Self {
        self.entities.push(entity_ref);
        self
    }

    pub fn with_trait(mut self, trait_ref: ObjectId) -> Self {
        self.applied_traits.push(trait_ref);
        self
    }
}
