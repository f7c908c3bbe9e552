//! Foundation types shared by the object graph and the resolver.

pub mod ids;
pub mod path;

pub use ids::{DocId, ObjectId};
pub use path::CorpusPath;
