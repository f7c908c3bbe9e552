//! Import matching and asynchronous loading.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use cdm_object_model::{Document, DocumentBuilder, EntityDef, ErrorKind};
use cdm_resolve::{Corpus, DocumentLoader, LoadRequest, ResolveError, Stage};
use cdm_tests::{init_logging, populate_foundations, TestCorpus, APP_FOLDER, FOUNDATIONS_IMPORT};

type Build = fn(&LoadRequest) -> Document;

/// Serves documents from a table of builders, recording every request.
#[derive(Default)]
struct MapLoader {
    documents: HashMap<String, Build>,
    requests: Mutex<Vec<String>>,
}

impl MapLoader {
    fn with(mut self, path: &str, build: Build) -> Self {
        self.documents.insert(path.to_string(), build);
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl DocumentLoader for MapLoader {
    fn load(&self, request: LoadRequest) -> BoxFuture<'_, cdm_resolve::Result<Document>> {
        Box::pin(async move {
            let path = request.path.to_string();
            self.requests.lock().unwrap().push(path.clone());
            tokio::time::sleep(Duration::from_millis(1)).await;
            match self.documents.get(&path) {
                Some(build) => Ok(build(&request)),
                None => Err(ResolveError::ImportLoad {
                    path,
                    reason: "no such document".to_string(),
                }),
            }
        })
    }
}

fn foundations_document(request: &LoadRequest) -> Document {
    let mut document = Document::new(request.id, request.folder.clone(), request.name.clone());
    populate_foundations(&mut document);
    document
}

fn common_document(request: &LoadRequest) -> Document {
    let mut document = Document::new(request.id, request.folder.clone(), request.name.clone());
    {
        let mut b = DocumentBuilder::new(&mut document);
        b.import(FOUNDATIONS_IMPORT, None);
        let id = b.type_attribute("id", "hasA", "guid", &[]);
        b.definition(EntityDef::new("Base").with_attribute(id));
    }
    document
}

/// `/app/main.cdm.json` with an `Account` extending `Base`, importing the
/// given documents.
fn main_corpus(imports: &[&str]) -> Corpus {
    init_logging();
    let mut corpus = Corpus::new();
    let main = corpus.create_document(APP_FOLDER, "main.cdm.json");
    if let Some(mut b) = corpus.builder(main) {
        for uri in imports {
            b.import(uri, None);
        }
        let base = b.entity_ref("Base");
        let name = b.type_attribute("name", "hasA", "string", &[]);
        b.definition(EntityDef::new("Account").with_extends(base).with_attribute(name));
    }
    corpus
}

fn account_attributes(corpus: &mut Corpus) -> Vec<String> {
    let account = corpus.fetch_object("/app/main.cdm.json/Account").unwrap();
    let main = account.doc();
    corpus
        .resolved_attributes(account, main)
        .unwrap()
        .names()
        .map(str::to_string)
        .collect()
}

/// Imports of loaded documents are requested in a second wave.
#[tokio::test]
async fn test_imports_load_in_waves() {
    let mut corpus = main_corpus(&["common.cdm.json"]);
    let loader = MapLoader::default()
        .with("/app/common.cdm.json", common_document)
        .with("/cdm/foundations.cdm.json", foundations_document);

    let reached = corpus.resolve_with_loader(&loader, Stage::Finished).await.unwrap();
    assert_eq!(reached, Stage::Finished);
    assert_eq!(
        loader.requested(),
        vec!["/app/common.cdm.json", "/cdm/foundations.cdm.json"]
    );
    assert_eq!(account_attributes(&mut corpus), vec!["id", "name"]);
}

/// A document imported from two places is requested once.
#[tokio::test]
async fn test_shared_import_is_requested_once() {
    let mut corpus = main_corpus(&["common.cdm.json", FOUNDATIONS_IMPORT]);
    let loader = MapLoader::default()
        .with("/app/common.cdm.json", common_document)
        .with("/cdm/foundations.cdm.json", foundations_document);

    let reached = corpus.resolve_with_loader(&loader, Stage::Finished).await.unwrap();
    assert_eq!(reached, Stage::Finished);
    assert_eq!(
        loader.requested(),
        vec!["/app/common.cdm.json", "/cdm/foundations.cdm.json"]
    );
    assert_eq!(account_attributes(&mut corpus), vec!["id", "name"]);
}

/// A failed load ends the run at the error stage with a missing import.
#[tokio::test]
async fn test_failed_load_ends_at_error() {
    let mut corpus = main_corpus(&["common.cdm.json"]);
    let loader = MapLoader::default();

    let reached = corpus.resolve_with_loader(&loader, Stage::Finished).await.unwrap();
    assert_eq!(reached, Stage::Error);
    assert_eq!(corpus.stage(), Stage::Error);
    assert!(corpus
        .diagnostics()
        .iter()
        .any(|d| d.kind == ErrorKind::MissingImport && d.path == "/app/common.cdm.json"));
    assert_eq!(loader.requested(), vec!["/app/common.cdm.json"]);
}

/// Without a loader, an import that matches no document fails the imports
/// stage.
#[test]
fn test_unloaded_import_is_reported() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("main.cdm.json");
    tc.builder(doc).import("missing.cdm.json", None);

    assert_eq!(tc.resolve(), Stage::Error);
    let missing = tc.diagnostics_of(ErrorKind::MissingImport);
    assert_eq!(missing.len(), 1);
    assert!(missing[0].message.contains("missing.cdm.json"));
}

/// When two imports declare the same name, the later import wins.
#[test]
fn test_later_import_shadows_earlier() {
    let mut tc = TestCorpus::new();
    for (name, attribute) in [("first.cdm.json", "firstId"), ("second.cdm.json", "secondId")] {
        let doc = tc.document(name);
        let mut b = tc.builder(doc);
        let id = b.type_attribute(attribute, "hasA", "guid", &[]);
        b.definition(EntityDef::new("Base").with_attribute(id));
    }
    let main = tc.document("main.cdm.json");
    let mut b = tc.builder(main);
    b.import("first.cdm.json", None).import("second.cdm.json", None);
    let base = b.entity_ref("Base");
    let account = b.definition(EntityDef::new("Account").with_extends(base));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(account, main), vec!["secondId"]);
}

fn misplaced_document(request: &LoadRequest) -> Document {
    Document::new(request.id, APP_FOLDER, "main.cdm.json")
}

/// A loaded document whose path is already taken is reported and dropped;
/// the import it was meant to satisfy stays missing.
#[tokio::test]
async fn test_loaded_document_with_taken_path_is_dropped() {
    let mut corpus = main_corpus(&["common.cdm.json"]);
    let loader = MapLoader::default().with("/app/common.cdm.json", misplaced_document);

    let reached = corpus.resolve_with_loader(&loader, Stage::Finished).await.unwrap();
    assert_eq!(reached, Stage::Error);
    let diagnostics = corpus.diagnostics();
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == ErrorKind::DuplicateDocument && d.path == "/app/main.cdm.json"));
    assert!(diagnostics.iter().any(|d| d.kind == ErrorKind::MissingImport));
    assert_eq!(corpus.graph().documents().count(), 1);
    assert!(corpus.fetch_object("/app/main.cdm.json/Account").is_some());
}
