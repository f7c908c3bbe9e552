//! Pipeline-wide resolution properties.
//!
//! Each test builds a small document on top of the foundations, runs the
//! pipeline and checks one property of the result: caching, argument
//! precedence, table merging, termination, stage gating and failure modes.

use std::sync::Arc;

use cdm_object_model::{
    Argument, DataTypeDef, EntityDef, ErrorKind, ParameterDef, RefKind, TraitDef,
};
use cdm_resolve::{
    ParameterValue, ResolveOptions, ResolvedTraitSet, ResultKind, Stage,
};
use cdm_tests::{text_args, TestCorpus};

fn table_rows(traits: &ResolvedTraitSet, trait_name: &str, parameter: &str) -> Vec<Vec<String>> {
    traits
        .find(trait_name)
        .and_then(|t| t.value(parameter))
        .and_then(ParameterValue::as_table)
        .map(|table| table.rows.clone())
        .unwrap_or_default()
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Resolving again after finishing changes nothing and reuses cached sets.
#[test]
fn test_resolution_is_idempotent() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let name = b.type_attribute("name", "hasA", "string", &[]);
    let product = b.definition(EntityDef::new("Product").with_attribute(name));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    let first = tc.corpus_mut().resolved_attributes(product, doc).unwrap();

    assert_eq!(tc.resolve(), Stage::Finished);
    let second = tc.corpus_mut().resolved_attributes(product, doc).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(tc.attribute_names(product, doc), vec!["name"]);
}

/// When one trait is applied twice, the later arguments win.
#[test]
fn test_later_arguments_override_earlier() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let level = b.object(ParameterDef::new("level"));
    b.definition(TraitDef::new("is.rated").with_parameter(level));

    let low = b.trait_ref_with("is.rated", text_args(&[("level", "1")]));
    let high = b.trait_ref_with("is.rated", text_args(&[("level", "2")]));
    let ascending = b.type_attribute("ascending", "hasA", "integer", &[low, high]);

    let low = b.trait_ref_with("is.rated", text_args(&[("level", "1")]));
    let high = b.trait_ref_with("is.rated", text_args(&[("level", "2")]));
    let descending = b.type_attribute("descending", "hasA", "integer", &[high, low]);

    b.definition(
        EntityDef::new("Rating")
            .with_attribute(ascending)
            .with_attribute(descending),
    );

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let traits = tc.traits(ascending, doc);
    assert_eq!(traits.find("is.rated").and_then(|t| t.text("level")), Some("2"));
    let traits = tc.traits(descending, doc);
    assert_eq!(traits.find("is.rated").and_then(|t| t.text("level")), Some("1"));
}

/// Localized tables of the same shape union their rows on the attribute,
/// while the data type keeps its own table.
#[test]
fn test_localized_tables_union_without_touching_the_data_type() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);

    let english = b.constant_table("localizedTable", &[&["en", "Product"]]);
    let displayed = b.trait_ref_with(
        "is.localized.displayedAs",
        vec![Argument::named("localizedDisplayText", english)],
    );
    let base = b.data_type_ref("string");
    let product_name = b.definition(
        DataTypeDef::new("productName")
            .with_extends(base)
            .with_trait(displayed),
    );

    let french = b.constant_table("localizedTable", &[&["fr", "Produit"]]);
    let localized = b.trait_ref_with(
        "is.localized.displayedAs",
        vec![Argument::named("localizedDisplayText", french)],
    );
    let name = b.type_attribute("name", "hasA", "productName", &[localized]);
    let product = b.definition(EntityDef::new("Product").with_attribute(name));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let attribute_traits = tc.traits(name, doc);
    assert_eq!(
        table_rows(&attribute_traits, "is.localized.displayedAs", "localizedDisplayText"),
        vec![row(&["en", "Product"]), row(&["fr", "Produit"])]
    );
    let data_type_traits = tc.traits(product_name, doc);
    assert_eq!(
        table_rows(&data_type_traits, "is.localized.displayedAs", "localizedDisplayText"),
        vec![row(&["en", "Product"])]
    );

    let set = tc.corpus_mut().resolved_attributes(product, doc).unwrap();
    let properties = set.get("name").unwrap().properties();
    assert_eq!(properties.display_name.as_deref(), Some("Product"));
}

/// An entity whose attribute points back at itself still resolves.
#[test]
fn test_self_referencing_entity_terminates() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("tree.cdm.json");
    let mut b = tc.builder(doc);
    let id = b.type_attribute("id", "hasA", "guid", &[]);
    let relationship = b.relationship_ref("hasA");
    let parent = b.entity_attribute("parent", relationship, "Node", &[]);
    let node = b.definition(EntityDef::new("Node").with_attribute(id).with_attribute(parent));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(node, doc), vec!["id"]);
}

/// Stopping at declarations records paths but resolves no reference.
#[test]
fn test_stopping_at_declarations_resolves_nothing() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let missing = b.trait_ref("is.nowhere");
    b.definition(EntityDef::new("Product").with_trait(missing));

    assert_eq!(tc.resolve_through(Stage::Declarations), Stage::Declarations);
    assert_eq!(tc.corpus().cached(ResultKind::Reference), 0);
    assert!(tc.diagnostics_of(ErrorKind::UnresolvedReference).is_empty());
    assert!(tc.corpus().fetch_object("/app/shop.cdm.json/Product").is_some());

    assert_eq!(tc.resolve(), Stage::Error);
    assert!(!tc.diagnostics_of(ErrorKind::UnresolvedReference).is_empty());
}

/// A moniker known to the writing document resolves the same way whatever
/// document is in effect.
#[test]
fn test_moniker_lookup_ignores_wrt_document() {
    let mut tc = TestCorpus::new();
    let library = tc.document("library.cdm.json");
    let thing = tc.builder(library).definition(EntityDef::new("Thing"));

    let app = tc.document("app.cdm.json");
    let mut b = tc.builder(app);
    b.import("library.cdm.json", Some("lib"));
    let base = b.entity_ref("lib/Thing");
    b.definition(EntityDef::new("Widget").with_extends(base));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let foundations = tc.foundations();
    let found = tc
        .corpus_mut()
        .resolve_name(RefKind::Entity, "lib/Thing", app, foundations)
        .unwrap()
        .unwrap();
    assert_eq!(found.definition, thing);
    assert!(found.via_moniker);

    let unqualified = tc
        .corpus_mut()
        .resolve_name(RefKind::Entity, "Thing", foundations, foundations)
        .unwrap();
    assert!(unqualified.is_none());
}

/// A fixed-size array expands into renamed copies and the template goes.
#[test]
fn test_array_expands_with_ordinal_names() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("billing.cdm.json");
    let mut b = tc.builder(doc);
    let rename = b.trait_ref_with(
        "does.renameWithFormat",
        text_args(&[("renameFormat", "{n}{o}"), ("ordinal", "1")]),
    );
    let array = b.trait_ref_with(
        "is.array",
        vec![
            Argument::named("fixedSize", "2"),
            Argument::named("renameTrait", rename),
        ],
    );
    let amount = b.type_attribute("amount", "hasA", "double", &[array]);
    let invoice = b.definition(EntityDef::new("Invoice").with_attribute(amount));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(invoice, doc), vec!["amount1", "amount2"]);

    let set = tc.corpus_mut().resolved_attributes(invoice, doc).unwrap();
    for (name, ordinal) in [("amount1", "1"), ("amount2", "2")] {
        let attribute = set.get(name).unwrap();
        assert_eq!(attribute.previous_resolved_name, "amount");
        assert!(attribute.traits().find("is.array").is_none());
        let stamped = attribute
            .traits()
            .find("does.renameWithFormat")
            .and_then(|t| t.text("ordinal"));
        assert_eq!(stamped, Some(ordinal));
    }
}

/// A required parameter left without a value fails the traits stage.
#[test]
fn test_missing_required_parameter_stops_the_run() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let code = b.object(ParameterDef::new("code").required());
    b.definition(TraitDef::new("is.coded").with_parameter(code));
    let coded = b.trait_ref("is.coded");
    let sku = b.type_attribute("sku", "hasA", "string", &[coded]);
    b.definition(EntityDef::new("Product").with_attribute(sku));

    assert_eq!(tc.resolve(), Stage::Error);
    assert_eq!(tc.corpus().stage(), Stage::Error);
    assert!(!tc.diagnostics_of(ErrorKind::MissingRequiredParameter).is_empty());
}

/// `this.attribute` binds the attribute the trait is applied to.
#[test]
fn test_this_attribute_binds_the_enclosing_attribute() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let identified = b.trait_ref_with("is.identifiedBy", text_args(&[("attribute", "this.attribute")]));
    let id = b.type_attribute("id", "hasA", "guid", &[identified]);
    let product = b.definition(EntityDef::new("Product").with_attribute(id));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let traits = tc.traits(id, doc);
    let bound = traits.find("is.identifiedBy").and_then(|t| t.value("attribute"));
    assert_eq!(bound, Some(&ParameterValue::Object(id)));

    let set = tc.corpus_mut().resolved_attributes(product, doc).unwrap();
    assert!(set.get("id").unwrap().properties().is_primary_key);
}

/// An object argument of the wrong kind is a parameter type error.
#[test]
fn test_object_argument_of_the_wrong_kind_is_rejected() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    b.definition(EntityDef::new("Customer"));
    let wrong = b.entity_ref("Customer");
    let identified = b.trait_ref_with("is.identifiedBy", vec![Argument::named("attribute", wrong)]);
    let id = b.type_attribute("id", "hasA", "guid", &[identified]);
    b.definition(EntityDef::new("Product").with_attribute(id));

    assert_eq!(tc.resolve(), Stage::Error);
    assert!(!tc.diagnostics_of(ErrorKind::ParameterType).is_empty());
}

/// Synthesis beyond the configured cap is reported and fails the run.
#[test]
fn test_synthesis_limit_is_enforced() {
    let mut tc = TestCorpus::with_options(ResolveOptions {
        max_synthesized_attributes: 2,
        ..ResolveOptions::default()
    });
    let doc = tc.document("billing.cdm.json");
    let mut b = tc.builder(doc);
    let rename = b.trait_ref_with(
        "does.renameWithFormat",
        text_args(&[("renameFormat", "{n}_{o}"), ("ordinal", "0")]),
    );
    let array = b.trait_ref_with(
        "is.array",
        vec![
            Argument::named("fixedSize", "5"),
            Argument::named("renameTrait", rename),
        ],
    );
    let line = b.type_attribute("line", "hasA", "string", &[array]);
    b.definition(EntityDef::new("Invoice").with_attribute(line));

    assert_eq!(tc.resolve(), Stage::Error);
    assert!(!tc.diagnostics_of(ErrorKind::SynthesisLimit).is_empty());
}
