//! Resolution diagnostics.
//!
//! Diagnostics are accumulated rather than thrown: every pass keeps walking
//! after a failure so a single run surfaces as many problems as possible.
//!
//! # Design
//!
//! - `Diagnostic`: single issue with a corpus path locating the declaration
//! - `ErrorKind`: categorizes the issue by the check that found it
//! - `Severity`: note, warning or error; ordered so thresholds compare
//!
//! # Examples
//!
//! ```
//! # use cdm_object_model::error::*;
//! let diag = Diagnostic::new(
//!     ErrorKind::UnresolvedReference,
//!     "/core/account.cdm.json/Account",
//!     "unable to resolve the reference 'Contact'".to_string(),
//! );
//! assert_eq!(diag.severity, Severity::Error);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One accumulated diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category of this issue
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Corpus path of the offending object (may be empty for corpus-wide issues)
    pub path: String,
    /// Human-readable message
    pub message: String,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of a diagnostic.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// An object failed its kind-specific minimal-shape check
    StructuralIntegrity = 0,
    /// Two declarations share a path inside one document
    DuplicateDeclaration = 1,
    /// A named reference did not resolve to a definition
    UnresolvedReference = 2,
    /// A required trait parameter has no resolved value
    MissingRequiredParameter = 3,
    /// An import URI was never satisfied by a loaded document
    MissingImport = 4,
    /// A parameter value does not match the parameter's object data type
    ParameterType = 5,
    /// Attribute synthesis exceeded the configured limit
    SynthesisLimit = 6,
    /// Informational progress messages
    Progress = 7,
    /// Bug in the resolver
    Internal = 8,
    /// A loaded document has the corpus path of one already loaded
    DuplicateDocument = 9,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "structural integrity",       // 0: StructuralIntegrity
    "duplicate declaration",      // 1: DuplicateDeclaration
    "unresolved reference",       // 2: UnresolvedReference
    "missing required parameter", // 3: MissingRequiredParameter
    "missing import",             // 4: MissingImport
    "parameter type",             // 5: ParameterType
    "synthesis limit",            // 6: SynthesisLimit
    "progress",                   // 7: Progress
    "internal resolver error",    // 8: Internal
    "duplicate document",         // 9: DuplicateDocument
];

/// Diagnostic severity level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational note (not an error)
    #[default]
    Note,
    /// Warning (tolerated, e.g. an entity reference during incremental authoring)
    Warning,
    /// Error (halts the pipeline at the next stage boundary)
    Error,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: String) -> Self {
        Self::with_severity(kind, Severity::Error, path, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, path: impl Into<String>, message: String) -> Self {
        Self::with_severity(kind, Severity::Warning, path, message)
    }

    /// Creates a new note diagnostic.
    pub fn note(kind: ErrorKind, path: impl Into<String>, message: String) -> Self {
        Self::with_severity(kind, Severity::Note, path, message)
    }

    /// Constructor with explicit severity.
    pub fn with_severity(
        kind: ErrorKind,
        severity: Severity,
        path: impl Into<String>,
        message: String,
    ) -> Self {
        Self {
            kind,
            severity,
            path: path.into(),
            message,
            notes: Vec::new(),
        }
    }

    /// Adds a note or hint.
    ///
    /// # Returns
    ///
    /// Self (for chaining).
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.kind.name(), self.message)?;
        if !self.path.is_empty() {
            write!(f, " ({})", self.path)?;
        }
        for note in &self.notes {
            write!(f, "\n   = help: {}", note)?;
        }
        Ok(())
    }
}
