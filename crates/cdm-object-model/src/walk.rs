//! Object graph walking utilities.
//!
//! Shared depth-first traversal so the pipeline stages don't each re-derive
//! which fields of which kind hold child objects.
//!
//! # Design
//!
//! - **Closure visitor** - caller provides `FnMut(WalkEvent, ObjectId, &str) -> bool`
//! - **Enter and leave** - one closure sees both the pre-order and the
//!   post-order call, so it can keep a scope stack in its own state
//! - **Early exit** - returning `true` from either call stops the whole walk
//!
//! Paths passed to the visitor are document-relative: a named definition
//! extends its parent's path with its name, anything else with its kind
//! label (`Account/name/traitRef`).
//!
//! # Examples
//!
//! ```
//! # use cdm_object_model::{ObjectGraph, EntityDef, walk::{walk_document, WalkEvent}};
//! let mut graph = ObjectGraph::new();
//! let doc = graph.create_document("/", "a.cdm.json");
//! graph.document_mut(doc).unwrap().add_definition(EntityDef::new("Account"));
//!
//! let mut seen = Vec::new();
//! walk_document(&graph, doc, &mut |event, _, path| {
//!     if event == WalkEvent::Enter {
//!         seen.push(path.to_string());
//!     }
//!     false
//! });
//! assert_eq!(seen, vec!["Account"]);
//! ```

use crate::foundation::{DocId, ObjectId};
use crate::graph::ObjectGraph;
use crate::object::{ArgumentValue, CdmObject, ObjectData, RefTarget};

/// Which side of a node the visitor is called on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Enter,
    Leave,
}

/// Child objects of a node, in traversal order.
pub fn children(data: &ObjectData) -> Vec<ObjectId> {
    let mut out = Vec::new();
    match data {
        ObjectData::Trait(d) => {
            out.extend(d.extends);
            out.extend(&d.parameters);
        }
        ObjectData::Parameter(d) => {
            out.extend(d.data_type);
            if let Some(ArgumentValue::Object(id)) = &d.default {
                out.push(*id);
            }
        }
        ObjectData::DataType(d) => {
            out.extend(d.extends);
            out.extend(&d.exhibits_traits);
        }
        ObjectData::Relationship(d) => {
            out.extend(d.extends);
            out.extend(&d.exhibits_traits);
        }
        ObjectData::AttributeGroup(d) => {
            out.extend(&d.members);
            out.extend(&d.exhibits_traits);
        }
        ObjectData::Entity(d) => {
            out.extend(d.extends);
            out.extend(&d.exhibits_traits);
            out.extend(&d.attributes);
        }
        ObjectData::ConstantEntity(d) => out.extend(d.shape),
        ObjectData::TypeAttribute(d) => {
            out.extend(d.relationship);
            out.extend(d.data_type);
            out.extend(&d.applied_traits);
        }
        ObjectData::EntityAttribute(d) => {
            out.extend(d.relationship);
            out.extend(&d.entities);
            out.extend(&d.applied_traits);
        }
        ObjectData::Reference(r) => {
            if let RefTarget::Explicit(def) = r.target {
                out.push(def);
            }
            out.extend(&r.applied_traits);
            for argument in &r.arguments {
                if let ArgumentValue::Object(id) = argument.value {
                    out.push(id);
                }
            }
        }
    }
    out
}

/// Path of `child` below `parent_path`.
pub fn child_path(parent_path: &str, child: &CdmObject) -> String {
    let label = child.name().unwrap_or_else(|| child.kind().name());
    if parent_path.is_empty() {
        label.to_string()
    } else {
        format!("{}/{}", parent_path, label)
    }
}

/// Walk the subtree rooted at `root`, whose own path is `path`.
///
/// Objects missing from the graph are skipped.
///
/// # Returns
///
/// `true` if the visitor stopped the walk.
pub fn walk_object<V>(graph: &ObjectGraph, root: ObjectId, path: &str, visitor: &mut V) -> bool
where
    V: FnMut(WalkEvent, ObjectId, &str) -> bool,
{
    let Some(object) = graph.get(root) else {
        return false;
    };
    if visitor(WalkEvent::Enter, root, path) {
        return true;
    }
    for child in children(&object.data) {
        let Some(child_object) = graph.get(child) else {
            continue;
        };
        let sub_path = child_path(path, child_object);
        if walk_object(graph, child, &sub_path, visitor) {
            return true;
        }
    }
    visitor(WalkEvent::Leave, root, path)
}

/// Walk every top-level definition of a document.
pub fn walk_document<V>(graph: &ObjectGraph, doc: DocId, visitor: &mut V) -> bool
where
    V: FnMut(WalkEvent, ObjectId, &str) -> bool,
{
    let Some(document) = graph.document(doc) else {
        return false;
    };
    for &definition in document.definitions() {
        let Some(object) = graph.get(definition) else {
            continue;
        };
        let path = child_path("", object);
        if walk_object(graph, definition, &path, visitor) {
            return true;
        }
    }
    false
}

/// Walk with separate pre-order and post-order callbacks.
pub fn visit<Pre, Post>(
    graph: &ObjectGraph,
    root: ObjectId,
    path: &str,
    mut pre: Pre,
    mut post: Post,
) -> bool
where
    Pre: FnMut(ObjectId, &str) -> bool,
    Post: FnMut(ObjectId, &str) -> bool,
{
    walk_object(graph, root, path, &mut |event, id, path| match event {
        WalkEvent::Enter => pre(id, path),
        WalkEvent::Leave => post(id, path),
    })
}
