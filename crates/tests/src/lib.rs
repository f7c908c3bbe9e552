//! Integration test harness for the schema resolution engine.
//!
//! This crate provides a standard foundations document (object data types,
//! data format flags, the traits the applier library binds to, and the
//! common relationships) and a [`TestCorpus`] wrapper that builds documents
//! importing it and drives the pipeline end to end.

use std::sync::Arc;

use cdm_object_model::{
    Argument, DataTypeDef, Diagnostic, DocId, Document, DocumentBuilder, EntityDef, ErrorKind,
    ObjectId, ParameterDef, RelationshipDef, Severity, TraitDef,
};
use cdm_resolve::{Corpus, ResolveOptions, ResolvedTraitSet, Stage, TraitScope};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const FOUNDATIONS_FOLDER: &str = "/cdm";
pub const FOUNDATIONS_NAME: &str = "foundations.cdm.json";
/// Folder of documents created by [`TestCorpus::document`].
pub const APP_FOLDER: &str = "/app";
/// The foundations import as written from [`APP_FOLDER`].
pub const FOUNDATIONS_IMPORT: &str = "../cdm/foundations.cdm.json";

/// Install a `tracing` subscriber for test output.
///
/// Honours `RUST_LOG`; defaults to `warn,cdm_resolve=debug`. Safe to call
/// from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,cdm_resolve=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Named text arguments for a trait reference.
pub fn text_args(pairs: &[(&str, &str)]) -> Vec<Argument> {
    pairs
        .iter()
        .map(|(name, value)| Argument::named(*name, *value))
        .collect()
}

fn parameters(b: &mut DocumentBuilder<'_>, specs: &[(&str, Option<&str>)]) -> Vec<ObjectId> {
    specs
        .iter()
        .map(|(name, data_type)| {
            let mut parameter = ParameterDef::new(*name);
            if let Some(data_type) = data_type {
                parameter = parameter.with_data_type(b.data_type_ref(data_type));
            }
            b.object(parameter)
        })
        .collect()
}

fn trait_def(
    b: &mut DocumentBuilder<'_>,
    name: &str,
    extends: Option<&str>,
    params: &[(&str, Option<&str>)],
) -> ObjectId {
    let mut def = TraitDef::new(name);
    if let Some(base) = extends {
        def = def.with_extends(b.trait_ref(base));
    }
    for parameter in parameters(b, params) {
        def = def.with_parameter(parameter);
    }
    b.definition(def)
}

fn data_type(b: &mut DocumentBuilder<'_>, name: &str, extends: Option<&str>, traits: &[&str]) {
    let mut def = DataTypeDef::new(name);
    if let Some(base) = extends {
        def = def.with_extends(b.data_type_ref(base));
    }
    for t in traits {
        def = def.with_trait(b.trait_ref(t));
    }
    b.definition(def);
}

/// Fill `document` with the foundations definitions.
pub fn populate_foundations(document: &mut Document) {
    let mut b = DocumentBuilder::new(document);

    for name in ["entity", "attribute", "trait", "dataType", "relationship", "attributeGroup"] {
        b.definition(DataTypeDef::new(name));
    }

    // Marker traits without parameters
    for name in [
        "is.dataFormat.characters",
        "is.dataFormat.array",
        "is.dataFormat.integer",
        "is.dataFormat.big",
        "is.dataFormat.small",
        "is.dataFormat.floatingPoint",
        "is.dataFormat.boolean",
        "is.dataFormat.guid",
        "is.dataFormat.date",
        "is.dataFormat.time",
        "is.dataFormat.bytes",
        "means.content.text.JSON",
        "is.nullable",
        "is.readOnly",
        "is.constrainedList",
        "is.removed",
    ] {
        b.definition(TraitDef::new(name));
    }

    data_type(&mut b, "string", None, &["is.dataFormat.characters", "is.dataFormat.array"]);
    data_type(&mut b, "integer", None, &["is.dataFormat.integer"]);
    data_type(&mut b, "bigInteger", Some("integer"), &["is.dataFormat.big"]);
    data_type(&mut b, "smallInteger", Some("integer"), &["is.dataFormat.small"]);
    data_type(&mut b, "double", None, &["is.dataFormat.floatingPoint", "is.dataFormat.big"]);
    data_type(&mut b, "boolean", None, &["is.dataFormat.boolean"]);
    data_type(&mut b, "guid", None, &["is.dataFormat.guid"]);
    data_type(&mut b, "dateTime", None, &["is.dataFormat.date", "is.dataFormat.time"]);
    data_type(&mut b, "json", Some("string"), &["means.content.text.JSON"]);

    trait_def(
        &mut b,
        "does.addAttribute",
        None,
        &[("addedAttribute", Some("attribute")), ("appliedTrait", Some("trait"))],
    );
    trait_def(
        &mut b,
        "does.addSupportingAttribute",
        None,
        &[("addedAttribute", Some("attribute")), ("appliedTrait", Some("trait"))],
    );
    trait_def(&mut b, "does.referenceEntity", Some("does.addSupportingAttribute"), &[]);
    trait_def(&mut b, "is.addedInSupportOf", None, &[("inSupportOf", None)]);
    trait_def(
        &mut b,
        "is.array",
        None,
        &[("fixedSize", None), ("renameTrait", Some("trait"))],
    );
    trait_def(
        &mut b,
        "does.renameWithFormat",
        None,
        &[("renameFormat", None), ("ordinal", None)],
    );
    trait_def(&mut b, "is.identifiedBy", None, &[("attribute", Some("attribute"))]);
    trait_def(
        &mut b,
        "is.localized.displayedAs",
        None,
        &[("localizedDisplayText", Some("entity"))],
    );
    trait_def(
        &mut b,
        "is.localized.describedAs",
        None,
        &[("localizedDescription", Some("entity"))],
    );
    trait_def(
        &mut b,
        "is.constrained",
        None,
        &[("maximumLength", None), ("maximumValue", None), ("minimumValue", None)],
    );
    trait_def(&mut b, "does.haveDefault", None, &[("default", None)]);
    trait_def(&mut b, "is.CDS.sourceNamed", None, &[("name", None)]);
    trait_def(&mut b, "is.CDS.ordered", None, &[("ordinal", None)]);

    b.definition(RelationshipDef::new("hasA"));
    b.definition(RelationshipDef::new("referencesA"));

    // Shape of localized text tables
    let language = b.type_attribute("languageTag", "hasA", "string", &[]);
    let text = b.type_attribute("displayText", "hasA", "string", &[]);
    b.definition(
        EntityDef::new("localizedTable")
            .with_attribute(language)
            .with_attribute(text),
    );
}

/// A corpus preloaded with the foundations document.
pub struct TestCorpus {
    corpus: Corpus,
    foundations: DocId,
}

impl Default for TestCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCorpus {
    pub fn new() -> Self {
        Self::with_options(ResolveOptions::default())
    }

    pub fn with_options(options: ResolveOptions) -> Self {
        Self::with_corpus(Corpus::with_options(options))
    }

    /// Wrap an empty corpus, adding the foundations document to it.
    pub fn with_corpus(mut corpus: Corpus) -> Self {
        init_logging();
        let foundations = corpus.create_document(FOUNDATIONS_FOLDER, FOUNDATIONS_NAME);
        if let Some(document) = corpus.graph_mut().document_mut(foundations) {
            populate_foundations(document);
        }
        Self {
            corpus,
            foundations,
        }
    }

    pub fn foundations(&self) -> DocId {
        self.foundations
    }

    /// Create `/app/<name>` importing the foundations.
    pub fn document(&mut self, name: &str) -> DocId {
        let doc = self.corpus.create_document(APP_FOLDER, name);
        self.builder(doc).import(FOUNDATIONS_IMPORT, None);
        doc
    }

    /// # Panics
    ///
    /// Panics if `doc` is not in the corpus.
    pub fn builder(&mut self, doc: DocId) -> DocumentBuilder<'_> {
        self.corpus.builder(doc).expect("unknown document")
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn corpus_mut(&mut self) -> &mut Corpus {
        &mut self.corpus
    }

    /// Run the whole pipeline.
    pub fn resolve(&mut self) -> Stage {
        self.resolve_through(Stage::Finished)
    }

    /// # Panics
    ///
    /// Panics on a fatal resolution error.
    pub fn resolve_through(&mut self, stage: Stage) -> Stage {
        self.corpus.resolve(stage).expect("fatal resolution error")
    }

    /// Resolved attribute names of an entity or attribute, in order.
    pub fn attribute_names(&mut self, object: ObjectId, wrt: DocId) -> Vec<String> {
        self.corpus
            .resolved_attributes(object, wrt)
            .expect("attribute resolution failed")
            .names()
            .map(str::to_string)
            .collect()
    }

    /// The `All` trait set of an object.
    pub fn traits(&mut self, object: ObjectId, wrt: DocId) -> Arc<ResolvedTraitSet> {
        self.corpus
            .resolved_traits(object, wrt, TraitScope::All)
            .expect("trait resolution failed")
            .unwrap_or_default()
    }

    pub fn diagnostics_of(&self, kind: ErrorKind) -> Vec<&Diagnostic> {
        self.corpus
            .diagnostics()
            .iter()
            .filter(|d| d.kind == kind)
            .collect()
    }

    /// # Panics
    ///
    /// Panics listing every error-severity diagnostic, if there are any.
    pub fn assert_no_errors(&self) {
        let errors: Vec<&Diagnostic> = self
            .corpus
            .diagnostics()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected errors: {:#?}", errors);
    }
}
