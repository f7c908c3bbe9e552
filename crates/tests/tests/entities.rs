//! Entity level results: entity references, inheritance, elevated traits,
//! attribute properties and trait queries, structural edits.

use std::sync::{Arc, Mutex};

use cdm_object_model::{
    Argument, AttributeGroupDef, Diagnostic, DocId, EntityAttributeDef, EntityDef, ErrorKind,
    ObjectId, RefKind, Reference, TraitDef,
};
use cdm_resolve::{
    Corpus, DataFormat, ParameterValue, ResolveOptions, Stage, TraitScope, TraitSpec,
};
use cdm_tests::{text_args, TestCorpus};

struct Orders {
    doc: DocId,
    customer: ObjectId,
    order: ObjectId,
    special: ObjectId,
    foreign_key: ObjectId,
}

/// Customer (identified by customerId), Order (references Customer through
/// a synthesized customerId) and SpecialOrder (extends Order).
fn orders(tc: &mut TestCorpus) -> Orders {
    let doc = tc.document("orders.cdm.json");
    let mut b = tc.builder(doc);

    let customer_id = b.type_attribute("customerId", "hasA", "guid", &[]);
    let customer_name = b.type_attribute("name", "hasA", "string", &[]);
    let identified = b.trait_ref_with(
        "is.identifiedBy",
        text_args(&[("attribute", "Customer/(resolvedAttributes)/customerId")]),
    );
    let customer = b.definition(
        EntityDef::new("Customer")
            .with_trait(identified)
            .with_attribute(customer_id)
            .with_attribute(customer_name),
    );

    let foreign_key = b.type_attribute("customerId", "hasA", "guid", &[]);
    let references = b.trait_ref_with(
        "does.referenceEntity",
        vec![Argument::named("addedAttribute", foreign_key)],
    );
    let relationship = b.object(
        Reference::named(RefKind::Relationship, "referencesA").with_applied_trait(references),
    );
    let customer_attribute = b.entity_attribute("customer", relationship, "Customer", &[]);
    let order_id = b.type_attribute("orderId", "hasA", "guid", &[]);
    let order = b.definition(
        EntityDef::new("Order")
            .with_attribute(order_id)
            .with_attribute(customer_attribute),
    );

    let base = b.entity_ref("Order");
    let priority = b.type_attribute("priority", "hasA", "integer", &[]);
    let special = b.definition(
        EntityDef::new("SpecialOrder")
            .with_extends(base)
            .with_attribute(priority),
    );

    Orders {
        doc,
        customer,
        order,
        special,
        foreign_key,
    }
}

/// A referencing relationship synthesizes the foreign key and pairs it with
/// the referenced entity's identifying attribute.
#[test]
fn test_entity_reference_links_foreign_key_to_identifying_attribute() {
    let mut tc = TestCorpus::new();
    let o = orders(&mut tc);
    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    assert_eq!(tc.attribute_names(o.order, o.doc), vec!["orderId", "customerId"]);

    let references = tc
        .corpus_mut()
        .resolved_entity_references(o.order, o.doc)
        .unwrap();
    assert_eq!(references.len(), 1);
    let reference = &references.references[0];
    assert_eq!(reference.referencing.entity, o.order);
    assert_eq!(reference.referencing.attribute_names(), vec!["customerId"]);
    assert_eq!(reference.referencing.attributes[0].target, o.foreign_key);
    assert_eq!(reference.referenced.len(), 1);
    assert_eq!(reference.referenced[0].entity, o.customer);
    assert_eq!(reference.referenced[0].attribute_names(), vec!["customerId"]);

    let set = tc.corpus_mut().resolved_attributes(o.order, o.doc).unwrap();
    let in_support_of = set
        .get("customerId")
        .unwrap()
        .traits()
        .find("is.addedInSupportOf")
        .and_then(|t| t.text("inSupportOf"))
        .map(str::to_string);
    assert_eq!(in_support_of.as_deref(), Some("customer"));
}

/// A derived entity starts from its base's attributes and references.
#[test]
fn test_derived_entity_inherits_attributes_and_references() {
    let mut tc = TestCorpus::new();
    let o = orders(&mut tc);
    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    assert_eq!(
        tc.attribute_names(o.special, o.doc),
        vec!["orderId", "customerId", "priority"]
    );
    let set = tc.corpus_mut().resolved_attributes(o.special, o.doc).unwrap();
    assert_eq!(set.inherited_attribute_count(), Some(2));

    let references = tc
        .corpus_mut()
        .resolved_entity_references(o.special, o.doc)
        .unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(references.references[0].referencing.entity, o.special);
    assert_eq!(references.references[0].referenced[0].entity, o.customer);

    assert!(tc.corpus_mut().is_derived_from(o.special, o.doc, "Order").unwrap());
    assert!(!tc.corpus_mut().is_derived_from(o.special, o.doc, "Customer").unwrap());
}

/// Elevated attribute traits only appear on the entity once finished.
#[test]
fn test_elevated_traits_surface_after_finish() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("ledger.cdm.json");
    let mut b = tc.builder(doc);
    b.definition(TraitDef::new("is.audited").with_elevated());
    let audited = b.trait_ref("is.audited");
    let changed = b.type_attribute("changedOn", "hasA", "dateTime", &[audited]);
    let ledger = b.definition(EntityDef::new("Ledger").with_attribute(changed));

    assert_eq!(tc.resolve_through(Stage::EntityReferences), Stage::EntityReferences);
    let early = tc
        .corpus_mut()
        .resolved_traits(ledger, doc, TraitScope::ElevatedOnly)
        .unwrap();
    assert!(early.is_none());
    assert!(tc.traits(ledger, doc).find("is.audited").is_none());

    assert_eq!(tc.resolve(), Stage::Finished);
    let elevated = tc
        .corpus_mut()
        .resolved_traits(ledger, doc, TraitScope::ElevatedOnly)
        .unwrap()
        .unwrap();
    assert!(elevated.find("is.audited").is_some());
    assert!(tc.traits(ledger, doc).find("is.audited").is_some());
}

struct Catalog {
    doc: DocId,
    product: ObjectId,
    quantity: ObjectId,
}

fn catalog(tc: &mut TestCorpus) -> Catalog {
    let doc = tc.document("catalog.cdm.json");
    let mut b = tc.builder(doc);

    let labels = b.constant_table(
        "localizedTable",
        &[&["de", "Produktname"], &["en", "Product name"]],
    );
    let displayed = b.trait_ref_with(
        "is.localized.displayedAs",
        vec![Argument::named("localizedDisplayText", labels)],
    );
    let constrained = b.trait_ref_with("is.constrained", text_args(&[("maximumLength", "64")]));
    let source = b.trait_ref_with("is.CDS.sourceNamed", text_args(&[("name", "prod_name")]));
    let name = b.type_attribute("name", "hasA", "string", &[displayed, constrained, source]);

    let nullable = b.trait_ref("is.nullable");
    let default = b.trait_ref_with("does.haveDefault", text_args(&[("default", "0")]));
    let quantity = b.type_attribute("quantity", "hasA", "integer", &[nullable, default]);

    let total = b.type_attribute("total", "hasA", "bigInteger", &[]);
    let price = b.type_attribute("price", "hasA", "double", &[]);
    let notes = b.type_attribute("notes", "hasA", "json", &[]);

    let product = b.definition(
        EntityDef::new("Product")
            .with_attribute(name)
            .with_attribute(quantity)
            .with_attribute(total)
            .with_attribute(price)
            .with_attribute(notes),
    );
    Catalog {
        doc,
        product,
        quantity,
    }
}

/// Properties are read from the well-known traits of each attribute.
#[test]
fn test_attribute_properties_follow_traits() {
    let mut tc = TestCorpus::new();
    let c = catalog(&mut tc);
    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let set = tc.corpus_mut().resolved_attributes(c.product, c.doc).unwrap();

    let name = set.get("name").unwrap().properties();
    assert_eq!(name.data_format, Some(DataFormat::String));
    assert_eq!(name.maximum_length.as_deref(), Some("64"));
    assert_eq!(name.display_name.as_deref(), Some("Product name"));
    assert_eq!(name.source_name.as_deref(), Some("prod_name"));
    assert!(!name.is_nullable);

    let quantity = set.get("quantity").unwrap().properties();
    assert_eq!(quantity.data_format, Some(DataFormat::Int32));
    assert!(quantity.is_nullable);
    assert_eq!(quantity.default_value, Some(ParameterValue::Text("0".to_string())));

    let format = |attribute: &str| set.get(attribute).unwrap().properties().data_format;
    assert_eq!(format("total"), Some(DataFormat::Int64));
    assert_eq!(format("price"), Some(DataFormat::Double));
    assert_eq!(format("notes"), Some(DataFormat::Json));
}

/// Trait queries match by ancestry and by parameter text.
#[test]
fn test_attributes_with_traits_query() {
    let mut tc = TestCorpus::new();
    let c = catalog(&mut tc);
    assert_eq!(tc.resolve(), Stage::Finished);

    let mut query = |specs: &[TraitSpec]| -> Vec<String> {
        tc.corpus_mut()
            .attributes_with_traits(c.product, c.doc, specs)
            .unwrap()
            .into_iter()
            .map(|a| a.resolved_name)
            .collect()
    };

    assert_eq!(query(&[TraitSpec::from("is.dataFormat.integer")]), vec!["quantity", "total"]);
    assert_eq!(
        query(&[TraitSpec::from("is.dataFormat.integer"), TraitSpec::from("is.nullable")]),
        vec!["quantity"]
    );
    assert_eq!(
        query(&[TraitSpec::new("is.constrained").with_parameter("maximumLength", "64")]),
        vec!["name"]
    );
    assert!(query(&[TraitSpec::new("is.constrained").with_parameter("maximumLength", "8")]).is_empty());
    assert!(query(&[]).is_empty());
}

/// Adding and removing a trait reference is reflected in later queries.
#[test]
fn test_structural_edit_reaches_resolved_attributes() {
    let mut tc = TestCorpus::new();
    let c = catalog(&mut tc);
    assert_eq!(tc.resolve(), Stage::Finished);

    let read_only = |tc: &mut TestCorpus| {
        tc.corpus_mut()
            .resolved_attributes(c.product, c.doc)
            .unwrap()
            .get("quantity")
            .unwrap()
            .properties()
            .is_read_only
    };
    assert!(!read_only(&mut tc));

    let trait_ref = tc
        .corpus_mut()
        .graph_mut()
        .document_mut(c.doc)
        .unwrap()
        .add_object(Reference::named(RefKind::Trait, "is.readOnly"));
    assert!(tc.corpus_mut().add_exhibited_trait(c.quantity, trait_ref));
    assert!(read_only(&mut tc));

    assert!(tc.corpus_mut().remove_exhibited_trait(c.quantity, trait_ref));
    assert!(!read_only(&mut tc));
}

/// Declared objects can be fetched by absolute corpus path.
#[test]
fn test_objects_are_addressable_by_corpus_path() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("catalog.cdm.json");
    let mut b = tc.builder(doc);
    let name = b.type_attribute("name", "hasA", "string", &[]);
    let product = b.definition(EntityDef::new("Product").with_attribute(name));
    assert_eq!(tc.resolve(), Stage::Finished);

    let corpus = tc.corpus();
    assert_eq!(corpus.fetch_object("/app/catalog.cdm.json/Product"), Some(product));
    assert_eq!(corpus.fetch_object("/app/catalog.cdm.json/Product/name"), Some(name));
    assert_eq!(corpus.fetch_object("/app/catalog.cdm.json/Missing"), None);

    let object = corpus.graph().get(name).unwrap();
    assert_eq!(object.declared_path.as_deref(), Some("Product/name"));
    assert_eq!(
        object.corpus_path.as_deref(),
        Some("/app/catalog.cdm.json/Product/name")
    );
}

/// Derivation follows data type `extends` chains.
#[test]
fn test_data_type_derivation() {
    let mut tc = TestCorpus::new();
    assert_eq!(tc.resolve(), Stage::Finished);
    let foundations = tc.foundations();
    let big = tc
        .corpus()
        .fetch_object("/cdm/foundations.cdm.json/bigInteger")
        .unwrap();

    let corpus = tc.corpus_mut();
    assert!(corpus.is_derived_from(big, foundations, "bigInteger").unwrap());
    assert!(corpus.is_derived_from(big, foundations, "integer").unwrap());
    assert!(!corpus.is_derived_from(big, foundations, "string").unwrap());
}

/// `is.removed` drops an attribute; `does.addAttribute` adds one after the
/// attribute carrying it.
#[test]
fn test_removed_and_added_attributes() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("accounts.cdm.json");
    let mut b = tc.builder(doc);
    let removed = b.trait_ref("is.removed");
    let secret = b.type_attribute("secret", "hasA", "string", &[removed]);
    let created = b.type_attribute("createdOn", "hasA", "dateTime", &[]);
    let adds = b.trait_ref_with("does.addAttribute", vec![Argument::named("addedAttribute", created)]);
    let id = b.type_attribute("id", "hasA", "guid", &[adds]);
    let account = b.definition(EntityDef::new("Account").with_attribute(id).with_attribute(secret));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(account, doc), vec!["id", "createdOn"]);

    let set = tc.corpus_mut().resolved_attributes(account, doc).unwrap();
    let created_on = set.get("createdOn").unwrap();
    assert_eq!(created_on.target, created);
    assert_eq!(created_on.properties().data_format, Some(DataFormat::DateTime));
}

/// An attribute carrying `is.removed` seeds no synthesis of its own.
#[test]
fn test_removed_attribute_adds_nothing() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("accounts.cdm.json");
    let mut b = tc.builder(doc);
    let removed = b.trait_ref("is.removed");
    let created = b.type_attribute("createdOn", "hasA", "dateTime", &[]);
    let adds = b.trait_ref_with("does.addAttribute", vec![Argument::named("addedAttribute", created)]);
    let secret = b.type_attribute("secret", "hasA", "string", &[removed, adds]);
    let id = b.type_attribute("id", "hasA", "guid", &[]);
    let account = b.definition(EntityDef::new("Account").with_attribute(id).with_attribute(secret));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(account, doc), vec!["id"]);
}

/// Audit group (createdOn, createdBy) and a Trail group nesting it after
/// its own `note` attribute.
fn audit_groups(tc: &mut TestCorpus, doc: DocId) -> (ObjectId, ObjectId) {
    let mut b = tc.builder(doc);
    let created_on = b.type_attribute("createdOn", "hasA", "dateTime", &[]);
    let created_by = b.type_attribute("createdBy", "hasA", "string", &[]);
    let audit = b.definition(
        AttributeGroupDef::new("Audit")
            .with_member(created_on)
            .with_member(created_by),
    );
    let note = b.type_attribute("note", "hasA", "string", &[]);
    let nested = b.attribute_group_ref("Audit");
    let trail = b.definition(AttributeGroupDef::new("Trail").with_member(note).with_member(nested));
    (audit, trail)
}

/// Group members land in the entity in declaration order, nested groups
/// included.
#[test]
fn test_attribute_groups_flatten_into_entity() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("audit.cdm.json");
    let (audit, trail) = audit_groups(&mut tc, doc);
    let mut b = tc.builder(doc);
    let id = b.type_attribute("id", "hasA", "guid", &[]);
    let group = b.attribute_group_ref("Audit");
    let invoice = b.definition(EntityDef::new("Invoice").with_attribute(id).with_attribute(group));
    let group = b.attribute_group_ref("Trail");
    let ledger = b.definition(EntityDef::new("Ledger").with_attribute(group));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(audit, doc), vec!["createdOn", "createdBy"]);
    assert_eq!(tc.attribute_names(trail, doc), vec!["note", "createdOn", "createdBy"]);
    assert_eq!(tc.attribute_names(invoice, doc), vec!["id", "createdOn", "createdBy"]);
    assert_eq!(tc.attribute_names(ledger, doc), vec!["note", "createdOn", "createdBy"]);
}

/// Traits applied on a group reference reach the members through that
/// reference only; the group definition and other uses stay untouched.
#[test]
fn test_traits_applied_on_group_reference_reach_members() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("audit.cdm.json");
    let (audit, _) = audit_groups(&mut tc, doc);
    let mut b = tc.builder(doc);
    let nullable = b.trait_ref("is.nullable");
    let group = b.object(Reference::named(RefKind::AttributeGroup, "Audit").with_applied_trait(nullable));
    let draft = b.definition(EntityDef::new("Draft").with_attribute(group));
    let group = b.attribute_group_ref("Audit");
    let invoice = b.definition(EntityDef::new("Invoice").with_attribute(group));
    let removed = b.trait_ref("is.removed");
    let group = b.object(Reference::named(RefKind::AttributeGroup, "Audit").with_applied_trait(removed));
    let id = b.type_attribute("id", "hasA", "guid", &[]);
    let bare = b.definition(EntityDef::new("Bare").with_attribute(id).with_attribute(group));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();

    let set = tc.corpus_mut().resolved_attributes(draft, doc).unwrap();
    for attribute in set.iter() {
        assert!(attribute.traits().find("is.nullable").is_some(), "{}", attribute.resolved_name);
        assert!(attribute.properties().is_nullable);
    }
    for object in [audit, invoice] {
        let set = tc.corpus_mut().resolved_attributes(object, doc).unwrap();
        assert!(set.iter().all(|a| !a.properties().is_nullable));
    }
    assert_eq!(tc.attribute_names(bare, doc), vec!["id"]);
}

/// Traits applied on the entity reference of an entity attribute reach the
/// attributes pulled from that entity.
#[test]
fn test_traits_applied_on_entity_reference_reach_members() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("people.cdm.json");
    let mut b = tc.builder(doc);
    let street = b.type_attribute("street", "hasA", "string", &[]);
    let city = b.type_attribute("city", "hasA", "string", &[]);
    let address = b.definition(EntityDef::new("Address").with_attribute(street).with_attribute(city));
    let read_only = b.trait_ref("is.readOnly");
    let entity = b.object(Reference::named(RefKind::Entity, "Address").with_applied_trait(read_only));
    let relationship = b.relationship_ref("hasA");
    let home = b.object(EntityAttributeDef::new("home", relationship, entity));
    let person = b.definition(EntityDef::new("Person").with_attribute(home));

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(person, doc), vec!["street", "city"]);

    let set = tc.corpus_mut().resolved_attributes(person, doc).unwrap();
    assert!(set.iter().all(|a| a.properties().is_read_only));
    let set = tc.corpus_mut().resolved_attributes(address, doc).unwrap();
    assert!(set.iter().all(|a| !a.properties().is_read_only));
}

/// Traits exhibited by an entity or a group describe the definition and
/// leave the member attributes alone.
#[test]
fn test_exhibited_traits_do_not_reach_members() {
    let mut tc = TestCorpus::new();
    let doc = tc.document("archive.cdm.json");
    let mut b = tc.builder(doc);
    let kept = b.type_attribute("kept", "hasA", "string", &[]);
    let nullable = b.trait_ref("is.nullable");
    let group = b.definition(AttributeGroupDef::new("Kept").with_member(kept).with_trait(nullable));
    let removed = b.trait_ref("is.removed");
    let id = b.type_attribute("id", "hasA", "guid", &[]);
    let group_ref = b.attribute_group_ref("Kept");
    let archive = b.definition(
        EntityDef::new("Archive")
            .with_trait(removed)
            .with_attribute(id)
            .with_attribute(group_ref),
    );

    assert_eq!(tc.resolve(), Stage::Finished);
    tc.assert_no_errors();
    assert_eq!(tc.attribute_names(archive, doc), vec!["id", "kept"]);
    assert!(tc.traits(group, doc).find("is.nullable").is_some());
    let set = tc.corpus_mut().resolved_attributes(archive, doc).unwrap();
    assert!(!set.get("kept").unwrap().properties().is_nullable);
}

/// A custom status sink sees every reported diagnostic.
#[test]
fn test_status_sink_receives_diagnostics() {
    let seen: Arc<Mutex<Vec<Diagnostic>>> = Arc::default();
    let sink = seen.clone();
    let corpus = Corpus::with_sink(ResolveOptions::default(), move |d: &Diagnostic| {
        sink.lock().unwrap().push(d.clone());
    });
    let mut tc = TestCorpus::with_corpus(corpus);
    let doc = tc.document("shop.cdm.json");
    let mut b = tc.builder(doc);
    let missing = b.trait_ref("is.nowhere");
    b.definition(EntityDef::new("Product").with_trait(missing));

    assert_eq!(tc.resolve(), Stage::Error);
    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|d| d.kind == ErrorKind::UnresolvedReference));
    assert_eq!(seen.len(), tc.corpus().diagnostics().len());
}
