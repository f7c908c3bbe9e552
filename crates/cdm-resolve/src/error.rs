//! Fatal resolution errors
//!
//! Problems in the corpus are accumulated as diagnostics (see
//! [`cdm_object_model::error`]). The errors here are the few conditions
//! where a single operation's inputs contradict themselves and the operation
//! cannot continue.

use thiserror::Error;

use cdm_object_model::{DocId, ObjectId};

/// Resolver result type
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Unrecoverable resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("duplicate parameter '{name}' in the parameter collection of {owner}")]
    DuplicateParameter { owner: ObjectId, name: String },

    #[error("trait '{trait_name}' has no parameter named '{name}'")]
    UnknownParameter { trait_name: String, name: String },

    #[error("trait '{trait_name}' has no parameter at position {ordinal}")]
    UnknownParameterOrdinal { trait_name: String, ordinal: usize },

    #[error("failed to load '{path}': {reason}")]
    ImportLoad { path: String, reason: String },

    #[error("document not found: {0}")]
    UnknownDocument(DocId),
}
