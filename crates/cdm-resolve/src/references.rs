//! Named reference resolution.
//!
//! # What This Pass Does
//!
//! Turns a reference's search string into the definition it names, using the
//! import graph of the document "in effect" (the wrt document):
//!
//! 1. the document's own declarations (exact document-relative path),
//! 2. a `moniker/rest` split, recursing into the moniker's document,
//! 3. the flattened transitive imports, last-imported first.
//!
//! An unqualified miss is retried from the reference's own document. A
//! moniker known to the reference's own document always resolves through
//! that moniker, which makes the result independent of the wrt document.
//! Any moniker-qualified result, whether the moniker came from the
//! reference's own document or from the wrt document, is cached against the
//! moniker's target document.
//!
//! `Entity/(resolvedAttributes)/name` bypasses declarations: the entity's
//! attribute set is resolved and the attribute is looked up by resolved name.

use cdm_object_model::{DocId, ObjectId, RefKind, RefTarget};

use crate::error::Result;
use crate::resolver::Resolver;

/// Marker segment of resolved-attribute paths.
pub const RESOLVED_ATTRIBUTES: &str = "(resolvedAttributes)";

/// Outcome of a successful reference resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedReference {
    pub definition: ObjectId,
    /// Resolution went through an explicit moniker.
    pub via_moniker: bool,
}

/// Whether a search string uses the resolved-attribute grammar.
pub fn is_resolved_attribute_path(name: &str) -> bool {
    name.contains(RESOLVED_ATTRIBUTES)
}

impl<'a> Resolver<'a> {
    /// Resolve a reference object to its definition.
    ///
    /// Explicit references resolve to their inline definition. Misses return
    /// `Ok(None)` and are not cached.
    pub fn resolve_reference(
        &mut self,
        reference: ObjectId,
        wrt: DocId,
    ) -> Result<Option<ResolvedReference>> {
        let Some(r) = self.data(reference).and_then(|d| d.as_reference()) else {
            return Ok(None);
        };
        let name = match &r.target {
            RefTarget::Explicit(definition) => {
                return Ok(Some(ResolvedReference {
                    definition: *definition,
                    via_moniker: false,
                }))
            }
            RefTarget::Named(name) => name,
        };

        let own_doc = reference.doc();
        let key_wrt = self.cache_wrt(own_doc, name, wrt);
        if let Some(hit) = self.ctx.cache.reference(reference, key_wrt) {
            return Ok(Some(hit));
        }

        let found = self.resolve_name(r.kind, name, own_doc, wrt)?;
        if let Some(found) = found {
            tracing::trace!(%reference, %name, definition = %found.definition, "reference resolved");
            self.ctx.cache.insert_reference(reference, key_wrt, found);
        }
        Ok(found)
    }

    /// Definition a reference points at, ignoring how it was found.
    pub fn reference_definition(&mut self, reference: ObjectId, wrt: DocId) -> Result<Option<ObjectId>> {
        Ok(self
            .resolve_reference(reference, wrt)?
            .map(|r| r.definition))
    }

    /// Resolve a search string that has no reference object of its own.
    ///
    /// `from` is the document the string was written in.
    pub fn resolve_name(
        &mut self,
        kind: RefKind,
        name: &str,
        from: DocId,
        wrt: DocId,
    ) -> Result<Option<ResolvedReference>> {
        if let Some((entity_name, attribute_name)) = split_resolved_attribute_path(name) {
            return self.resolve_attribute_path(kind, entity_name, attribute_name, from, wrt);
        }

        if self.moniker_target(from, name).is_some() {
            return Ok(self.search(kind, name, from));
        }
        if let Some(found) = self.search(kind, name, wrt) {
            return Ok(Some(found));
        }
        if from != wrt {
            return Ok(self.search(kind, name, from));
        }
        Ok(None)
    }

    /// The wrt document a reference result is cached against: the moniker's
    /// target when the name is moniker-qualified in the reference's own
    /// document or, failing that, in the wrt document.
    fn cache_wrt(&self, own_doc: DocId, name: &str, wrt: DocId) -> DocId {
        self.moniker_target(own_doc, name)
            .or_else(|| self.moniker_target(wrt, name))
            .unwrap_or(wrt)
    }

    /// Document named by the moniker prefix of `name` in `doc`, if any.
    fn moniker_target(&self, doc: DocId, name: &str) -> Option<DocId> {
        let (prefix, _) = name.split_once('/')?;
        self.graph
            .document(doc)?
            .import_index()
            .monikers
            .get(prefix)
            .copied()
    }

    /// Declaration search from one document.
    ///
    /// Moniker recursion always shortens `name`, so it terminates; import
    /// cycles were already broken when the flattened list was built.
    fn search(&self, kind: RefKind, name: &str, doc: DocId) -> Option<ResolvedReference> {
        let document = self.graph.document(doc)?;

        if let Some(found) = self.accept(kind, document.declaration(name)) {
            return Some(ResolvedReference {
                definition: found,
                via_moniker: false,
            });
        }

        if let Some((prefix, rest)) = name.split_once('/') {
            if let Some(&target) = document.import_index().monikers.get(prefix) {
                if let Some(found) = self.search(kind, rest, target) {
                    return Some(ResolvedReference {
                        definition: found.definition,
                        via_moniker: true,
                    });
                }
            }
        }

        for &imported in document.import_index().flattened.iter().rev() {
            let declared = self
                .graph
                .document(imported)
                .and_then(|d| d.declaration(name));
            if let Some(found) = self.accept(kind, declared) {
                return Some(ResolvedReference {
                    definition: found,
                    via_moniker: false,
                });
            }
        }
        None
    }

    fn accept(&self, kind: RefKind, candidate: Option<ObjectId>) -> Option<ObjectId> {
        let candidate = candidate?;
        let object_kind = self.graph.get(candidate)?.kind();
        kind.accepts(object_kind).then_some(candidate)
    }

    fn resolve_attribute_path(
        &mut self,
        kind: RefKind,
        entity_name: &str,
        attribute_name: &str,
        from: DocId,
        wrt: DocId,
    ) -> Result<Option<ResolvedReference>> {
        let Some(entity) = self.resolve_name(RefKind::Entity, entity_name, from, wrt)? else {
            return Ok(None);
        };
        let resolution = self.resolve_attributes(entity.definition, wrt)?;
        let Some(set) = resolution.set() else {
            return Ok(None);
        };
        let Some(attribute) = set.get(attribute_name) else {
            return Ok(None);
        };
        let target = attribute.target;
        Ok(self.accept(kind, Some(target)).map(|definition| ResolvedReference {
            definition,
            via_moniker: entity.via_moniker,
        }))
    }
}

/// Split `Entity/(resolvedAttributes)/name` into its two names.
fn split_resolved_attribute_path(name: &str) -> Option<(&str, &str)> {
    let marker = format!("/{}/", RESOLVED_ATTRIBUTES);
    let at = name.find(&marker)?;
    Some((&name[..at], &name[at + marker.len()..]))
}
