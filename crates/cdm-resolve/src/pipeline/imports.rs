//! The imports stage and asynchronous import loading.
//!
//! Matching pairs each import with an installed document by normalized
//! corpus path. Indexing then builds, per document:
//!
//! - the moniker map (a later import with the same moniker wins)
//! - the flattened import list: monikered imports first, then for each plain
//!   import its own plain imports (depth first) followed by the import itself.
//!   A document reached again moves to the end, and the document itself is
//!   never listed. Lookups scan this list from the back.
//!
//! Loading runs in waves. Each wave requests every import that matches no
//! installed document and has not been requested before, awaits all of them,
//! installs the results, and looks again.

use std::collections::HashSet;

use futures::future::{try_join_all, BoxFuture};
use tracing::instrument;

use cdm_object_model::{
    CorpusPath, Diagnostic, DocId, Document, ErrorKind, Import, ImportIndex, ObjectGraph,
};

use crate::context::ResolveContext;
use crate::error::{ResolveError, Result};

/// One document the pipeline wants loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Id the loaded document must be built with.
    pub id: DocId,
    pub path: CorpusPath,
    pub folder: CorpusPath,
    pub name: String,
}

/// Supplies document content for imports that are not loaded yet.
///
/// A failed request should be reported as [`ResolveError::ImportLoad`]; any
/// failure ends the run at the error stage.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, request: LoadRequest) -> BoxFuture<'_, Result<Document>>;
}

fn import_target(document: &Document, import: &Import) -> CorpusPath {
    document.folder().resolve_relative(&import.uri)
}

/// Import targets that match no installed document, in discovery order.
pub(crate) fn missing_paths(graph: &ObjectGraph) -> Vec<CorpusPath> {
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for document in graph.documents() {
        for import in document.imports() {
            let target = import_target(document, import);
            if graph.document_by_path(&target).is_none() && seen.insert(target.clone()) {
                missing.push(target);
            }
        }
    }
    missing
}

/// Request missing imports wave by wave until a wave finds nothing new.
///
/// # Returns
///
/// `false` if any request failed; the failure has been reported. A loaded
/// document whose path is already taken is reported and dropped.
pub(crate) async fn load_missing(
    graph: &mut ObjectGraph,
    ctx: &mut ResolveContext,
    loader: &dyn DocumentLoader,
) -> bool {
    let mut requested: HashSet<CorpusPath> = HashSet::new();
    let mut wave = 0usize;
    loop {
        let missing: Vec<CorpusPath> = missing_paths(graph)
            .into_iter()
            .filter(|p| !requested.contains(p))
            .collect();
        if missing.is_empty() {
            tracing::debug!(waves = wave, "import loading settled");
            return true;
        }
        wave += 1;
        tracing::debug!(wave, count = missing.len(), "requesting missing imports");

        let requests: Vec<LoadRequest> = missing
            .into_iter()
            .map(|path| {
                requested.insert(path.clone());
                LoadRequest {
                    id: graph.reserve_document(),
                    folder: path.parent().unwrap_or_else(CorpusPath::root),
                    name: path.last().unwrap_or_default().to_string(),
                    path,
                }
            })
            .collect();

        let paths: Vec<CorpusPath> = requests.iter().map(|r| r.path.clone()).collect();
        match try_join_all(requests.into_iter().map(|r| loader.load(r))).await {
            Ok(documents) => {
                for (requested_path, document) in paths.into_iter().zip(documents) {
                    let loaded_path = document.path();
                    if !graph.install_document(document) {
                        ctx.report(Diagnostic::new(
                            ErrorKind::DuplicateDocument,
                            loaded_path.to_string(),
                            format!(
                                "document loaded for '{requested_path}' has the path of a document already loaded"
                            ),
                        ));
                    }
                }
            }
            Err(err) => {
                let path = match &err {
                    ResolveError::ImportLoad { path, .. } => path.clone(),
                    _ => String::new(),
                };
                ctx.report(Diagnostic::new(ErrorKind::MissingImport, path, err.to_string()));
                return false;
            }
        }
    }
}

/// Match imports to documents and build every document's import index.
#[instrument(skip_all)]
pub(crate) fn imports(graph: &mut ObjectGraph, ctx: &mut ResolveContext) {
    let ids = graph.document_ids();
    for &doc in &ids {
        let Some(document) = graph.document(doc) else {
            continue;
        };
        let path = document.path().to_string();
        let mut matched = Vec::with_capacity(document.imports().len());
        for import in document.imports() {
            let target = import_target(document, import);
            let found = graph.document_by_path(&target);
            if found.is_none() {
                ctx.report(Diagnostic::new(
                    ErrorKind::MissingImport,
                    path.clone(),
                    format!("import '{}' ({}) was never loaded", import.uri, target),
                ));
            }
            matched.push(found);
        }
        if let Some(document) = graph.document_mut(doc) {
            for (import, found) in document.imports_mut().iter_mut().zip(matched) {
                import.document = found;
            }
        }
    }

    for &doc in &ids {
        let index = build_index(graph, doc);
        tracing::debug!(%doc, monikers = index.monikers.len(), flattened = index.flattened.len(), "import index built");
        if let Some(document) = graph.document_mut(doc) {
            document.set_import_index(index);
        }
    }
}

fn push_moved(list: &mut Vec<DocId>, doc: DocId) {
    list.retain(|d| *d != doc);
    list.push(doc);
}

fn build_index(graph: &ObjectGraph, doc: DocId) -> ImportIndex {
    let mut index = ImportIndex::default();
    let Some(document) = graph.document(doc) else {
        return index;
    };
    for import in document.imports() {
        if let (Some(moniker), Some(target)) = (&import.moniker, import.document) {
            index.monikers.insert(moniker.clone(), target);
            push_moved(&mut index.flattened, target);
        }
    }
    let mut visiting = HashSet::from([doc]);
    for import in document.imports().iter().filter(|i| i.moniker.is_none()) {
        if let Some(target) = import.document {
            flatten_into(graph, target, &mut visiting, &mut index.flattened);
        }
    }
    index.flattened.retain(|d| *d != doc);
    index
}

/// Plain imports of `doc` (depth first), then `doc` itself.
fn flatten_into(graph: &ObjectGraph, doc: DocId, visiting: &mut HashSet<DocId>, out: &mut Vec<DocId>) {
    if !visiting.insert(doc) {
        return;
    }
    if let Some(document) = graph.document(doc) {
        for import in document.imports().iter().filter(|i| i.moniker.is_none()) {
            if let Some(target) = import.document {
                flatten_into(graph, target, visiting, out);
            }
        }
    }
    push_moved(out, doc);
    visiting.remove(&doc);
}
