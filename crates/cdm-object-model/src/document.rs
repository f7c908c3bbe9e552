//! Documents: the unit of ownership and import scoping.
//!
//! A document owns an arena of [`CdmObject`]s addressed by [`ObjectId`], a
//! list of top-level definitions, and its import list. The resolver fills in
//! the declaration map and the import index during the pipeline.

use indexmap::IndexMap;

use crate::foundation::{CorpusPath, DocId, ObjectId};
use crate::object::{CdmObject, ObjectData};

/// One entry of a document's import list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Path relative to the importing document's folder.
    pub uri: String,
    /// Alias for explicit `moniker/Name` lookup.
    pub moniker: Option<String>,
    /// The document this import was matched to by the imports stage.
    pub document: Option<DocId>,
}

/// Import lookup tables built by the imports stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportIndex {
    /// Moniker → imported document.
    pub monikers: IndexMap<String, DocId>,
    /// Transitively imported documents, searched last-first.
    pub flattened: Vec<DocId>,
}

/// A named container of definitions.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocId,
    folder: CorpusPath,
    name: String,
    objects: Vec<CdmObject>,
    definitions: Vec<ObjectId>,
    imports: Vec<Import>,
    declarations: IndexMap<String, ObjectId>,
    import_index: ImportIndex,
}

impl Document {
    pub fn new(id: DocId, folder: impl Into<CorpusPath>, name: impl Into<String>) -> Self {
        Self {
            id,
            folder: folder.into(),
            name: name.into(),
            objects: Vec::new(),
            definitions: Vec::new(),
            imports: Vec::new(),
            declarations: IndexMap::new(),
            import_index: ImportIndex::default(),
        }
    }

    pub fn id(&self) -> DocId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &CorpusPath {
        &self.folder
    }

    /// Absolute corpus path of the document (`/folder/name`).
    pub fn path(&self) -> CorpusPath {
        self.folder.append(self.name.clone())
    }

    /// Allocate an object in this document's arena.
    pub fn add_object(&mut self, data: impl Into<ObjectData>) -> ObjectId {
        let id = ObjectId::new(self.id, self.objects.len() as u32);
        self.objects.push(CdmObject::new(id, data.into()));
        id
    }

    /// Allocate an object and list it as a top-level definition.
    pub fn add_definition(&mut self, data: impl Into<ObjectData>) -> ObjectId {
        let id = self.add_object(data);
        self.definitions.push(id);
        id
    }

    pub fn add_import(&mut self, uri: impl Into<String>, moniker: Option<&str>) {
        self.imports.push(Import {
            uri: uri.into(),
            moniker: moniker.map(str::to_string),
            document: None,
        });
    }

    pub fn object(&self, id: ObjectId) -> Option<&CdmObject> {
        if id.doc() != self.id {
            return None;
        }
        self.objects.get(id.index())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut CdmObject> {
        if id.doc() != self.id {
            return None;
        }
        self.objects.get_mut(id.index())
    }

    pub fn objects(&self) -> &[CdmObject] {
        &self.objects
    }

    pub fn definitions(&self) -> &[ObjectId] {
        &self.definitions
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn imports_mut(&mut self) -> &mut [Import] {
        &mut self.imports
    }

    pub fn declarations(&self) -> &IndexMap<String, ObjectId> {
        &self.declarations
    }

    /// Look up a declaration by its document-relative path.
    pub fn declaration(&self, path: &str) -> Option<ObjectId> {
        self.declarations.get(path).copied()
    }

    /// Record a declaration.
    ///
    /// # Errors
    ///
    /// Returns the previously declared object when `path` is already taken;
    /// the existing entry is kept.
    pub fn declare(&mut self, path: String, id: ObjectId) -> Result<(), ObjectId> {
        match self.declarations.get(&path) {
            Some(existing) => Err(*existing),
            None => {
                self.declarations.insert(path, id);
                Ok(())
            }
        }
    }

    pub fn clear_declarations(&mut self) {
        self.declarations.clear();
    }

    pub fn import_index(&self) -> &ImportIndex {
        &self.import_index
    }

    pub fn set_import_index(&mut self, index: ImportIndex) {
        self.import_index = index;
    }
}
