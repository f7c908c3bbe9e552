//! Parameter collections and resolved parameter values.
//!
//! A trait's full parameter collection is its base trait's collection
//! followed by its own declared parameters. Resolved argument vectors are
//! positional and aligned to that collection.

use std::collections::HashMap;
use std::sync::Arc;

use cdm_object_model::{ArgumentValue, ObjectId, RefKind};

use crate::error::{ResolveError, Result};

/// One parameter of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub id: ObjectId,
    pub name: String,
    pub required: bool,
    pub data_type: Option<ObjectId>,
    pub default: Option<ArgumentValue>,
}

/// Ordered, name-unique parameters of a trait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterCollection {
    owner_name: String,
    parameters: Vec<ParameterInfo>,
    by_name: HashMap<String, usize>,
}

impl ParameterCollection {
    /// Build `base` followed by `own`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::DuplicateParameter`] when a name appears twice.
    pub fn new(
        owner: ObjectId,
        owner_name: &str,
        base: Option<&ParameterCollection>,
        own: Vec<ParameterInfo>,
    ) -> Result<Self> {
        let mut collection = Self {
            owner_name: owner_name.to_string(),
            ..Self::default()
        };
        let inherited = base.map(|b| b.parameters.clone()).unwrap_or_default();
        for parameter in inherited.into_iter().chain(own) {
            if collection.by_name.contains_key(&parameter.name) {
                return Err(ResolveError::DuplicateParameter {
                    owner,
                    name: parameter.name,
                });
            }
            collection
                .by_name
                .insert(parameter.name.clone(), collection.parameters.len());
            collection.parameters.push(parameter);
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParameterInfo> {
        self.parameters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterInfo> {
        self.parameters.iter()
    }

    /// Position of a parameter, if it exists.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownParameter`] when no parameter has that name.
    pub fn resolve_name(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| ResolveError::UnknownParameter {
                trait_name: self.owner_name.clone(),
                name: name.to_string(),
            })
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownParameterOrdinal`] past the end of the collection.
    pub fn resolve_ordinal(&self, ordinal: usize) -> Result<usize> {
        if ordinal < self.parameters.len() {
            Ok(ordinal)
        } else {
            Err(ResolveError::UnknownParameterOrdinal {
                trait_name: self.owner_name.clone(),
                ordinal,
            })
        }
    }
}

/// Rows of a constant entity used as an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantTable {
    /// The constant entity definition the rows came from.
    pub entity: ObjectId,
    /// Resolved shape entity.
    pub shape: Option<ObjectId>,
    pub rows: Vec<Vec<String>>,
}

impl ConstantTable {
    /// Value of `column` in the first row whose `key_column` equals `key`.
    pub fn lookup(&self, key_column: usize, key: &str, column: usize) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.get(key_column).map(String::as_str) == Some(key))
            .and_then(|row| row.get(column))
            .map(String::as_str)
    }
}

/// A resolved argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Text(String),
    /// A reference or inline definition in the graph.
    Object(ObjectId),
    /// A constant entity, shared until a merge needs to extend it.
    Table(Arc<ConstantTable>),
    /// A text value retyped by the constant type check; resolved on use from
    /// the document `from`.
    Named {
        kind: RefKind,
        name: String,
        from: cdm_object_model::DocId,
    },
}

impl ParameterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(text) => Some(text),
            ParameterValue::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Arc<ConstantTable>> {
        match self {
            ParameterValue::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Positional argument values plus whether each was explicitly supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValueSet {
    values: Vec<Option<ParameterValue>>,
    was_set: Vec<bool>,
}

impl ParameterValueSet {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![None; len],
            was_set: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParameterValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn was_set(&self, index: usize) -> bool {
        self.was_set.get(index).copied().unwrap_or(false)
    }

    /// Grow to `len` positions; new positions are unset.
    pub fn resize(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, None);
            self.was_set.resize(len, false);
        }
    }

    pub fn set(&mut self, index: usize, value: Option<ParameterValue>, explicit: bool) {
        self.resize(index + 1);
        self.values[index] = value;
        self.was_set[index] = explicit;
    }

    /// Merge `incoming` over `self`.
    ///
    /// # Returns
    ///
    /// The merged vector, or `None` when nothing would change.
    pub fn merged_with(&self, incoming: &ParameterValueSet) -> Option<ParameterValueSet> {
        let len = self.len().max(incoming.len());
        let mut merged: Option<ParameterValueSet> = None;
        for index in 0..len {
            let old = self.get(index);
            let new = incoming.get(index);
            let new_set = incoming.was_set(index);
            let replacement = match (old, new) {
                (_, None) => None,
                (None, Some(new)) => Some((new.clone(), new_set)),
                (Some(_), Some(_)) if !new_set => None,
                (Some(ParameterValue::Table(a)), Some(ParameterValue::Table(b)))
                    if a.shape == b.shape =>
                {
                    union_tables(a, b).map(|t| (ParameterValue::Table(t), true))
                }
                (Some(old), Some(new)) if old == new => None,
                (Some(_), Some(new)) => Some((new.clone(), true)),
            };
            if let Some((value, explicit)) = replacement {
                let target = merged.get_or_insert_with(|| {
                    let mut copy = self.clone();
                    copy.resize(len);
                    copy
                });
                target.values[index] = Some(value);
                target.was_set[index] = explicit || self.was_set(index);
            }
        }
        merged
    }
}

/// Rows of `old` followed by the rows of `new` not already present.
///
/// Returns `None` when `old` already holds every row of `new`.
fn union_tables(old: &Arc<ConstantTable>, new: &Arc<ConstantTable>) -> Option<Arc<ConstantTable>> {
    if Arc::ptr_eq(old, new) {
        return None;
    }
    if old.rows.is_empty() {
        return (!new.rows.is_empty()).then(|| new.clone());
    }
    let missing: Vec<&Vec<String>> = new
        .rows
        .iter()
        .filter(|row| !old.rows.contains(row))
        .collect();
    if missing.is_empty() {
        return None;
    }
    let mut union = ConstantTable::clone(old);
    union.rows.extend(missing.into_iter().cloned());
    Some(Arc::new(union))
}
