//! Stable identifiers for documents and objects.
//!
//! Every object in the graph is owned by exactly one document, so an
//! [`ObjectId`] is the pair (owning document, index within that document).
//! Ids are plain integers: they are cheap to copy, hash and compare, which is
//! what the resolution cache needs from a context identity.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw index.
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            /// The raw index as a `usize`, for addressing storage vectors.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_index!(
    /// Identity of a document within a corpus.
    DocId,
    "doc#"
);

/// Identity of an object (definition, reference or parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    doc: DocId,
    index: u32,
}

impl ObjectId {
    /// Create an id for the `index`-th object of `doc`.
    pub fn new(doc: DocId, index: u32) -> Self {
        Self { doc, index }
    }

    /// The document that owns this object.
    pub fn doc(self) -> DocId {
        self.doc
    }

    /// Position of the object inside its document's arena.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/obj#{}", self.doc, self.index)
    }
}
