//! Per-run resolution state.
//!
//! [`ResolveContext`] owns everything a resolution run mutates: the result
//! cache, the scope stack used by parameter binding, the applier bindings
//! attached in the traits stage, argument replacements produced by the
//! parameter type check, and the diagnostic trail with its error counter.
//!
//! The object graph itself is never mutated while resolving; that split is
//! what lets a [`Resolver`](crate::resolver::Resolver) borrow the graph
//! shared and the context exclusively at the same time.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use cdm_object_model::{Diagnostic, ErrorKind, ObjectId, Severity};

use crate::appliers::TraitApplier;
use crate::cache::ResolutionCache;
use crate::traits::ParameterValue;

/// Tunables for a resolution run.
///
/// # Examples
///
/// ```
/// # use cdm_resolve::ResolveOptions;
/// # use cdm_object_model::Severity;
/// let options: ResolveOptions = serde_json::from_str(r#"{ "report_level": "warning" }"#).unwrap();
/// assert_eq!(options.report_level, Severity::Warning);
/// assert_eq!(options.error_level, Severity::Error);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Minimum severity forwarded to the status sink.
    pub report_level: Severity,
    /// Minimum severity that counts as an error for stage gating.
    pub error_level: Severity,
    /// Cap on attributes synthesized by one applier pipeline run.
    pub max_synthesized_attributes: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            report_level: Severity::Note,
            error_level: Severity::Error,
            max_synthesized_attributes: 10_000,
        }
    }
}

/// Receives every reported diagnostic at or above the report level.
pub trait StatusSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Mirrors diagnostics into `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        let kind = diagnostic.kind.name();
        match diagnostic.severity {
            Severity::Error => {
                tracing::error!(kind, path = %diagnostic.path, "{}", diagnostic.message)
            }
            Severity::Warning => {
                tracing::warn!(kind, path = %diagnostic.path, "{}", diagnostic.message)
            }
            Severity::Note => {
                tracing::info!(kind, path = %diagnostic.path, "{}", diagnostic.message)
            }
        }
    }
}

impl<F> StatusSink for F
where
    F: FnMut(&Diagnostic),
{
    fn report(&mut self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Global switches threaded through trait resolution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPhase {
    /// Whether elevated traits are computed and folded into `All` sets.
    pub elevated_enabled: bool,
}

/// One level of the parameter-binding scope stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFrame {
    pub entity: Option<ObjectId>,
    pub attribute: Option<ObjectId>,
    pub trait_ref: Option<ObjectId>,
}

/// A parameter value substituted by the constant type check.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgument {
    pub value: ParameterValue,
    /// Whether the value came from an argument rather than a default.
    pub explicit: bool,
}

pub struct ResolveContext {
    pub(crate) options: ResolveOptions,
    sink: Box<dyn StatusSink + Send>,
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    pub(crate) cache: ResolutionCache,
    pub(crate) scope: Vec<ScopeFrame>,
    /// Trait definition → appliers bound through its ancestry.
    pub(crate) appliers: HashMap<ObjectId, Vec<&'static TraitApplier>>,
    /// (trait reference, parameter index) → type-checked replacement value.
    pub(crate) replacements: HashMap<(ObjectId, usize), BoundArgument>,
}

impl ResolveContext {
    pub fn new(options: ResolveOptions) -> Self {
        Self::with_sink(options, Box::new(TracingSink))
    }

    pub fn with_sink(options: ResolveOptions, sink: Box<dyn StatusSink + Send>) -> Self {
        Self {
            options,
            sink,
            diagnostics: Vec::new(),
            error_count: 0,
            cache: ResolutionCache::default(),
            scope: Vec::new(),
            appliers: HashMap::new(),
            replacements: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Record a diagnostic, forward it to the sink and count it.
    ///
    /// Progress notes never count as errors.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity >= self.options.report_level {
            self.sink.report(&diagnostic);
        }
        if diagnostic.severity >= self.options.error_level && diagnostic.kind != ErrorKind::Progress {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub(crate) fn reset_error_count(&mut self) {
        self.error_count = 0;
    }

    /// The innermost scope frame.
    pub(crate) fn scope(&self) -> ScopeFrame {
        self.scope.last().copied().unwrap_or_default()
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

impl fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("options", &self.options)
            .field("diagnostics", &self.diagnostics.len())
            .field("error_count", &self.error_count)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
