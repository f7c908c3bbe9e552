//! The object graph: every loaded document, addressed by [`DocId`].
//!
//! Document ids are allocated by the graph, either immediately
//! ([`ObjectGraph::create_document`]) or ahead of an asynchronous load
//! ([`ObjectGraph::reserve_document`]) so that a loader can build the
//! document's arena with final [`ObjectId`]s before it is installed.

use std::collections::{BTreeMap, HashMap};

use crate::document::Document;
use crate::foundation::{CorpusPath, DocId, ObjectId};
use crate::object::{CdmObject, ObjectData};

#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    documents: BTreeMap<DocId, Document>,
    by_path: HashMap<CorpusPath, DocId>,
    next_doc: u32,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh document id without installing a document.
    pub fn reserve_document(&mut self) -> DocId {
        let id = DocId::new(self.next_doc);
        self.next_doc += 1;
        id
    }

    /// Create and install an empty document at `folder/name`.
    ///
    /// Returns the id of the document already at that path, if there is one.
    pub fn create_document(&mut self, folder: &str, name: &str) -> DocId {
        let id = self.reserve_document();
        let document = Document::new(id, folder, name);
        if let Some(&existing) = self.by_path.get(&document.path()) {
            return existing;
        }
        self.install_document(document);
        id
    }

    /// Install a document built against a reserved id.
    ///
    /// # Returns
    ///
    /// `false` when a document with the same corpus path is already loaded;
    /// the new document is dropped and the loaded one stays.
    pub fn install_document(&mut self, document: Document) -> bool {
        let id = document.id();
        let path = document.path();
        if let Some(existing) = self.by_path.get(&path) {
            tracing::warn!(%path, doc = %id, existing = %existing, "document path already loaded");
            return false;
        }
        if id.index() as u32 >= self.next_doc {
            self.next_doc = id.index() as u32 + 1;
        }
        tracing::debug!(%path, doc = %id, "document installed");
        self.by_path.insert(path, id);
        self.documents.insert(id, document);
        true
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn document_mut(&mut self, id: DocId) -> Option<&mut Document> {
        self.documents.get_mut(&id)
    }

    /// Installed documents, in id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn document_ids(&self) -> Vec<DocId> {
        self.documents.keys().copied().collect()
    }

    pub fn document_by_path(&self, path: &CorpusPath) -> Option<DocId> {
        self.by_path.get(path).copied()
    }

    pub fn get(&self, id: ObjectId) -> Option<&CdmObject> {
        self.documents.get(&id.doc())?.object(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut CdmObject> {
        self.documents.get_mut(&id.doc())?.object_mut(id)
    }

    pub fn data(&self, id: ObjectId) -> Option<&ObjectData> {
        self.get(id).map(|o| &o.data)
    }

    /// Find an object by absolute corpus path
    /// (`/folder/doc.cdm.json/Account/name`).
    ///
    /// The longest document path that prefixes `corpus_path` wins; the
    /// remainder is looked up in that document's declarations.
    pub fn fetch_object(&self, corpus_path: &str) -> Option<ObjectId> {
        let path = CorpusPath::from_path_str(corpus_path);
        let segments = path.segments();
        for split in (1..=segments.len()).rev() {
            let doc_path = CorpusPath::new(segments[..split].to_vec());
            if let Some(doc) = self.document_by_path(&doc_path) {
                let rest = segments[split..].join("/");
                if rest.is_empty() {
                    return None;
                }
                return self.document(doc)?.declaration(&rest);
            }
        }
        None
    }
}
