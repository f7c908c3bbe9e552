//! Corpus path representation
//!
//! Corpus paths are slash-separated and always absolute:
//! - `/core/foundations.cdm.json` (a document)
//! - `/core/foundations.cdm.json/is.array` (a declaration inside it)
//!
//! Import URIs are relative to the importing document's folder and may use
//! `.` and `..` segments; [`CorpusPath::resolve_relative`] normalizes them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An absolute, normalized path inside the corpus namespace.
///
/// # Examples
///
/// ```
/// # use cdm_object_model::foundation::CorpusPath;
/// let folder = CorpusPath::from("/core/applicationCommon");
/// let doc = folder.resolve_relative("../foundations.cdm.json");
/// assert_eq!(doc.to_string(), "/core/foundations.cdm.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorpusPath {
    segments: Vec<String>,
}

impl CorpusPath {
    /// The corpus root (`/`).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Create a path from already-normalized segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a slash-separated path, normalizing `.`, `..` and empty segments.
    pub fn from_path_str(s: &str) -> Self {
        Self::root().resolve_relative(s)
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the last segment (document or declaration name).
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append a segment to create a new path.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// Get the parent path; the root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self::new(self.segments[..self.segments.len() - 1].to_vec()))
        }
    }

    /// Check if this path starts with another path.
    pub fn starts_with(&self, prefix: &CorpusPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Resolve `relative` against this path, treated as a folder.
    ///
    /// A leading `/` makes `relative` absolute. `..` above the root stays at
    /// the root.
    pub fn resolve_relative(&self, relative: &str) -> Self {
        let mut segments = if relative.starts_with('/') {
            Vec::new()
        } else {
            self.segments.clone()
        };
        for part in relative.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        Self { segments }
    }
}

impl fmt::Display for CorpusPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl From<&str> for CorpusPath {
    fn from(s: &str) -> Self {
        Self::from_path_str(s)
    }
}

impl From<String> for CorpusPath {
    fn from(s: String) -> Self {
        Self::from_path_str(&s)
    }
}

impl PartialEq<&str> for CorpusPath {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}
