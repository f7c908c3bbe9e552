// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Resolution engine for CDM schema documents
//!
//! This crate resolves named references across the import graph, binds
//! trait parameters, derives resolved trait and attribute sets through the
//! trait applier library, discovers entity references, and drives all of it
//! through the staged pipeline behind [`Corpus`].

pub mod appliers;
pub mod attributes;
pub mod cache;
pub mod context;
pub mod corpus;
pub mod entity_refs;
pub mod error;
pub mod pipeline;
pub mod references;
pub mod resolver;
pub mod traits;

pub use appliers::{TraitApplier, TRAIT_APPLIERS};
pub use attributes::{
    AttributeResolution, DataFormat, ResolvedAttribute, ResolvedAttributeProperties,
    ResolvedAttributeSet, TraitSpec,
};
pub use cache::{ResultKind, TraitScope};
pub use context::{ResolutionPhase, ResolveContext, ResolveOptions, StatusSink, TracingSink};
pub use corpus::Corpus;
pub use entity_refs::{
    ResolvedEntityReference, ResolvedEntityReferenceSet, ResolvedEntityReferenceSide,
};
pub use error::{ResolveError, Result};
pub use pipeline::{DocumentLoader, LoadRequest, Stage};
pub use references::ResolvedReference;
pub use resolver::Resolver;
pub use traits::{ConstantTable, ParameterValue, ResolvedTrait, ResolvedTraitSet};
