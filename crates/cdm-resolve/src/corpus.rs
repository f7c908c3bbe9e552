//! The corpus facade.
//!
//! A [`Corpus`] owns the object graph, the run context and the stage the
//! pipeline has reached. Callers build or load documents, drive the pipeline
//! with [`Corpus::resolve`] (or [`Corpus::resolve_with_loader`] when imports
//! must be fetched), then query resolved traits, attributes and entity
//! references with respect to a document.
//!
//! # Examples
//!
//! ```
//! # use cdm_resolve::{Corpus, Stage};
//! # use cdm_object_model::EntityDef;
//! let mut corpus = Corpus::new();
//! let doc = corpus.create_document("/", "a.cdm.json");
//! corpus.builder(doc).unwrap().definition(EntityDef::new("Account"));
//! assert_eq!(corpus.resolve(Stage::Finished).unwrap(), Stage::Finished);
//! let account = corpus.fetch_object("/a.cdm.json/Account").unwrap();
//! assert!(corpus.resolved_attributes(account, doc).unwrap().is_empty());
//! ```

use std::sync::Arc;

use cdm_object_model::{Diagnostic, DocId, DocumentBuilder, ObjectGraph, ObjectId, RefKind};

use crate::attributes::{ResolvedAttribute, ResolvedAttributeSet, TraitSpec};
use crate::cache::{ResultKind, TraitScope};
use crate::context::{ResolutionPhase, ResolveContext, ResolveOptions, StatusSink};
use crate::entity_refs::ResolvedEntityReferenceSet;
use crate::error::{ResolveError, Result};
use crate::pipeline::{self, imports, DocumentLoader, Stage};
use crate::references::ResolvedReference;
use crate::resolver::Resolver;
use crate::traits::ResolvedTraitSet;

#[derive(Debug)]
pub struct Corpus {
    graph: ObjectGraph,
    ctx: ResolveContext,
    phase: ResolutionPhase,
    stage: Stage,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

impl Corpus {
    pub fn new() -> Self {
        Self::with_options(ResolveOptions::default())
    }

    pub fn with_options(options: ResolveOptions) -> Self {
        Self::from_context(ResolveContext::new(options))
    }

    /// A corpus reporting through `sink` instead of `tracing`.
    pub fn with_sink(options: ResolveOptions, sink: impl StatusSink + Send + 'static) -> Self {
        Self::from_context(ResolveContext::with_sink(options, Box::new(sink)))
    }

    fn from_context(ctx: ResolveContext) -> Self {
        Self {
            graph: ObjectGraph::new(),
            ctx,
            phase: ResolutionPhase::default(),
            stage: Stage::Start,
        }
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn create_document(&mut self, folder: &str, name: &str) -> DocId {
        self.graph.create_document(folder, name)
    }

    pub fn builder(&mut self, doc: DocId) -> Option<DocumentBuilder<'_>> {
        self.graph.document_mut(doc).map(DocumentBuilder::new)
    }

    /// The last stage the pipeline reached.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn phase(&self) -> ResolutionPhase {
        self.phase
    }

    pub fn options(&self) -> &ResolveOptions {
        self.ctx.options()
    }

    /// Number of cached results of one kind.
    pub fn cached(&self, kind: ResultKind) -> usize {
        self.ctx.cache.len_of(kind)
    }

    /// Every diagnostic reported so far, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.ctx.diagnostics()
    }

    /// Continue the pipeline from the stage already reached.
    pub fn resolve(&mut self, through: Stage) -> Result<Stage> {
        self.resolve_from(self.stage, through)
    }

    /// Run every stage after `from` up to and including `through`.
    ///
    /// # Returns
    ///
    /// The stage reached; [`Stage::Error`] once any stage leaves errors.
    pub fn resolve_from(&mut self, from: Stage, through: Stage) -> Result<Stage> {
        let reached = pipeline::run(&mut self.graph, &mut self.ctx, &mut self.phase, from, through);
        self.stage = match &reached {
            Ok(stage) => *stage,
            Err(_) => Stage::Error,
        };
        reached
    }

    /// Fetch missing imports through `loader`, then resolve.
    ///
    /// A failed load ends the run at [`Stage::Error`] without running any
    /// stage.
    pub async fn resolve_with_loader(
        &mut self,
        loader: &dyn DocumentLoader,
        through: Stage,
    ) -> Result<Stage> {
        if !imports::load_missing(&mut self.graph, &mut self.ctx, loader).await {
            self.stage = Stage::Error;
            return Ok(Stage::Error);
        }
        self.resolve(through)
    }

    /// Find an object by absolute corpus path.
    pub fn fetch_object(&self, corpus_path: &str) -> Option<ObjectId> {
        self.graph.fetch_object(corpus_path)
    }

    fn resolver(&mut self, wrt: DocId) -> Result<Resolver<'_>> {
        let resolver = Resolver::new(&self.graph, &mut self.ctx, self.phase);
        if !resolver.wrt_exists(wrt) {
            return Err(ResolveError::UnknownDocument(wrt));
        }
        Ok(resolver)
    }

    /// Resolve a search string written in document `from`.
    pub fn resolve_name(
        &mut self,
        kind: RefKind,
        name: &str,
        from: DocId,
        wrt: DocId,
    ) -> Result<Option<ResolvedReference>> {
        self.resolver(wrt)?.resolve_name(kind, name, from, wrt)
    }

    /// Resolved traits of one scope; `None` for elevated traits before the
    /// pipeline has finished.
    pub fn resolved_traits(
        &mut self,
        object: ObjectId,
        wrt: DocId,
        scope: TraitScope,
    ) -> Result<Option<Arc<ResolvedTraitSet>>> {
        self.resolver(wrt)?.resolve_traits(object, wrt, scope)
    }

    /// Resolved attributes; a re-entrant request reads as an empty set.
    pub fn resolved_attributes(&mut self, object: ObjectId, wrt: DocId) -> Result<Arc<ResolvedAttributeSet>> {
        Ok(self.resolver(wrt)?.resolve_attributes(object, wrt)?.into_set())
    }

    pub fn resolved_entity_references(
        &mut self,
        entity: ObjectId,
        wrt: DocId,
    ) -> Result<Arc<ResolvedEntityReferenceSet>> {
        self.resolver(wrt)?.resolve_entity_references(entity, wrt)
    }

    /// Resolved attributes carrying every trait in `specs`.
    pub fn attributes_with_traits(
        &mut self,
        object: ObjectId,
        wrt: DocId,
        specs: &[TraitSpec],
    ) -> Result<Vec<ResolvedAttribute>> {
        let set = self.resolved_attributes(object, wrt)?;
        Ok(set.attributes_with_traits(specs).into_iter().cloned().collect())
    }

    pub fn is_derived_from(&mut self, object: ObjectId, wrt: DocId, base_name: &str) -> Result<bool> {
        self.resolver(wrt)?.is_derived_from(object, wrt, base_name)
    }

    /// Attach a trait reference to a definition's exhibited traits (data
    /// types, relationships, groups, entities) or applied traits (attributes,
    /// references).
    ///
    /// # Returns
    ///
    /// `false` when `object` cannot carry traits.
    pub fn add_exhibited_trait(&mut self, object: ObjectId, trait_ref: ObjectId) -> bool {
        let Some(traits) = self.trait_list_mut(object) else {
            return false;
        };
        traits.push(trait_ref);
        self.invalidate(object);
        true
    }

    /// Detach a trait reference added with [`Corpus::add_exhibited_trait`] or
    /// present from the start.
    ///
    /// # Returns
    ///
    /// `false` when the reference was not on the object.
    pub fn remove_exhibited_trait(&mut self, object: ObjectId, trait_ref: ObjectId) -> bool {
        let Some(traits) = self.trait_list_mut(object) else {
            return false;
        };
        let before = traits.len();
        traits.retain(|t| *t != trait_ref);
        if traits.len() == before {
            return false;
        }
        self.invalidate(object);
        true
    }

    fn trait_list_mut(&mut self, object: ObjectId) -> Option<&mut Vec<ObjectId>> {
        let data = &mut self.graph.get_mut(object)?.data;
        let kind = data.kind();
        if kind.is_attribute() || kind.is_reference() {
            data.applied_traits_mut()
        } else {
            data.exhibits_traits_mut()
        }
    }

    /// Drop the edited object's results along with every derived result,
    /// since other objects may have folded its traits into theirs.
    fn invalidate(&mut self, object: ObjectId) {
        tracing::debug!(%object, "structural edit");
        self.ctx.cache.invalidate_object(object);
        self.ctx.cache.clear_derived();
    }
}
