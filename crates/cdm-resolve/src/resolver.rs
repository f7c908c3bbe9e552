//! The resolver handle.
//!
//! A [`Resolver`] pairs a shared borrow of the object graph with an exclusive
//! borrow of the run's [`ResolveContext`] and the current
//! [`ResolutionPhase`]. The engines (references, traits, attributes, entity
//! references) are `impl Resolver` blocks in their own modules.

use cdm_object_model::{Diagnostic, DocId, ErrorKind, ObjectData, ObjectGraph, ObjectId};

use crate::cache::CacheKey;
use crate::context::{ResolutionPhase, ResolveContext};

pub struct Resolver<'a> {
    pub(crate) graph: &'a ObjectGraph,
    pub(crate) ctx: &'a mut ResolveContext,
    pub(crate) phase: ResolutionPhase,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a ObjectGraph, ctx: &'a mut ResolveContext, phase: ResolutionPhase) -> Self {
        Self { graph, ctx, phase }
    }

    pub fn graph(&self) -> &'a ObjectGraph {
        self.graph
    }

    pub fn phase(&self) -> ResolutionPhase {
        self.phase
    }

    pub(crate) fn data(&self, id: ObjectId) -> Option<&'a ObjectData> {
        self.graph.data(id)
    }

    /// Best available path of an object, for diagnostics.
    pub(crate) fn path_of(&self, id: ObjectId) -> String {
        let Some(object) = self.graph.get(id) else {
            return id.to_string();
        };
        if let Some(path) = &object.corpus_path {
            return path.clone();
        }
        let doc = self
            .graph
            .document(id.doc())
            .map(|d| d.path().to_string())
            .unwrap_or_default();
        match object.name() {
            Some(name) => format!("{}/{}", doc, name),
            None => format!("{}/{}", doc, object.kind().name()),
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.ctx.report(diagnostic);
    }

    pub(crate) fn report_internal(&mut self, id: ObjectId, message: String) {
        let path = self.path_of(id);
        self.ctx
            .report(Diagnostic::new(ErrorKind::Internal, path, message));
    }

    /// Run `compute` under a re-entrancy guard for `key`.
    ///
    /// # Returns
    ///
    /// `None` when `key` is already being computed further up the stack.
    pub(crate) fn guarded<T>(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce(&mut Self) -> crate::Result<T>,
    ) -> crate::Result<Option<T>> {
        if !self.ctx.cache.enter(key) {
            tracing::trace!(object = %key.object, wrt = %key.wrt, kind = ?key.kind, "re-entrant resolution");
            return Ok(None);
        }
        let result = compute(self);
        if !self.ctx.cache.leave(&key) {
            self.report_internal(
                key.object,
                format!("{:?} resolution finished without being in progress", key.kind),
            );
        }
        result.map(Some)
    }

    pub(crate) fn wrt_exists(&self, wrt: DocId) -> bool {
        self.graph.document(wrt).is_some()
    }
}
