//! References to definitions.
//!
//! A reference is either *named* (a search string, resolved lazily against a
//! document's import graph) or *explicit* (it owns an inline, anonymous
//! definition, so no search is needed). Trait references additionally carry
//! an argument list.

use serde::{Deserialize, Serialize};

use super::ObjectKind;
use crate::foundation::ObjectId;

/// What kind of definition a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Trait,
    DataType,
    Relationship,
    AttributeGroup,
    Entity,
    Attribute,
}

impl RefKind {
    /// Name used by parameter data types and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            RefKind::Trait => "trait",
            RefKind::DataType => "dataType",
            RefKind::Relationship => "relationship",
            RefKind::AttributeGroup => "attributeGroup",
            RefKind::Entity => "entity",
            RefKind::Attribute => "attribute",
        }
    }

    /// Map an object data-type name (`entity`, `attribute`, ...) to a kind.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "trait" => Some(RefKind::Trait),
            "dataType" => Some(RefKind::DataType),
            "relationship" => Some(RefKind::Relationship),
            "attributeGroup" => Some(RefKind::AttributeGroup),
            "entity" => Some(RefKind::Entity),
            "attribute" => Some(RefKind::Attribute),
            _ => None,
        }
    }

    /// The object kind a reference of this kind has.
    pub fn reference_kind(self) -> ObjectKind {
        match self {
            RefKind::Trait => ObjectKind::TraitRef,
            RefKind::DataType => ObjectKind::DataTypeRef,
            RefKind::Relationship => ObjectKind::RelationshipRef,
            RefKind::AttributeGroup => ObjectKind::AttributeGroupRef,
            RefKind::Entity => ObjectKind::EntityRef,
            RefKind::Attribute => ObjectKind::AttributeRef,
        }
    }

    /// Whether a definition of `kind` satisfies a reference of this kind.
    ///
    /// Entity references also accept constant entities; attribute references
    /// accept both attribute flavours.
    pub fn accepts(self, kind: ObjectKind) -> bool {
        match self {
            RefKind::Trait => kind == ObjectKind::TraitDef,
            RefKind::DataType => kind == ObjectKind::DataTypeDef,
            RefKind::Relationship => kind == ObjectKind::RelationshipDef,
            RefKind::AttributeGroup => kind == ObjectKind::AttributeGroupDef,
            RefKind::Entity => {
                matches!(kind, ObjectKind::EntityDef | ObjectKind::ConstantEntityDef)
            }
            RefKind::Attribute => matches!(
                kind,
                ObjectKind::TypeAttributeDef | ObjectKind::EntityAttributeDef
            ),
        }
    }
}

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Search string such as `Account`, `b/Account` or
    /// `Account/(resolvedAttributes)/accountId`.
    Named(String),
    /// An owned inline definition.
    Explicit(ObjectId),
}

/// A literal argument or parameter default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Text(String),
    /// Another object: a reference or an inline definition.
    Object(ObjectId),
}

impl ArgumentValue {
    /// The text of a literal value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text(text) => Some(text),
            ArgumentValue::Object(_) => None,
        }
    }
}

impl From<&str> for ArgumentValue {
    fn from(text: &str) -> Self {
        ArgumentValue::Text(text.to_string())
    }
}

impl From<String> for ArgumentValue {
    fn from(text: String) -> Self {
        ArgumentValue::Text(text)
    }
}

impl From<ObjectId> for ArgumentValue {
    fn from(id: ObjectId) -> Self {
        ArgumentValue::Object(id)
    }
}

/// One argument of a trait reference, bound by name or else by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: ArgumentValue,
    pub explanation: Option<String>,
}

impl Argument {
    pub fn positional(value: impl Into<ArgumentValue>) -> Self {
        Self {
            name: None,
            value: value.into(),
            explanation: None,
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            explanation: None,
        }
    }
}

/// A reference node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub target: RefTarget,
    /// Use-site applied trait references.
    pub applied_traits: Vec<ObjectId>,
    /// Arguments (trait references only).
    pub arguments: Vec<Argument>,
}

impl Reference {
    pub fn named(kind: RefKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            target: RefTarget::Named(name.into()),
            applied_traits: Vec::new(),
            arguments: Vec::new(),
        }
    }

    pub fn explicit(kind: RefKind, definition: ObjectId) -> Self {
        Self {
            kind,
            target: RefTarget::Explicit(definition),
            applied_traits: Vec::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_applied_trait(mut self, trait_ref: ObjectId) -> Self {
        self.applied_traits.push(trait_ref);
        self
    }

    /// The search string of a named reference.
    pub fn named_string(&self) -> Option<&str> {
        match &self.target {
            RefTarget::Named(name) => Some(name),
            RefTarget::Explicit(_) => None,
        }
    }

    /// The inline definition of an explicit reference.
    pub fn explicit_definition(&self) -> Option<ObjectId> {
        match self.target {
            RefTarget::Explicit(id) => Some(id),
            RefTarget::Named(_) => None,
        }
    }
}
