// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Object model for CDM schema documents
//!
//! This crate contains the typed definition and reference nodes, the
//! documents that own them, the object graph arena, the diagnostic model and
//! the foundation types (ids, corpus paths) used by the resolver.

pub mod builder;
pub mod document;
pub mod error;
pub mod foundation;
pub mod graph;
pub mod integrity;
pub mod object;
pub mod walk;

// Re-export commonly used types
pub use builder::DocumentBuilder;
pub use document::{Document, Import, ImportIndex};
pub use error::{Diagnostic, ErrorKind, Severity};
pub use foundation::{CorpusPath, DocId, ObjectId};
pub use graph::ObjectGraph;
pub use object::*;
