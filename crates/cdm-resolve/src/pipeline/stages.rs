//! Stage bodies after `imports`.
//!
//! Each stage covers every installed document in id order. Objects are
//! resolved with respect to the document that owns them.

use std::collections::HashSet;

use tracing::instrument;

use cdm_object_model::walk::{walk_document, WalkEvent};
use cdm_object_model::{
    integrity, ArgumentValue, Diagnostic, DocId, ErrorKind, ObjectData, ObjectGraph, ObjectId,
    ObjectKind, RefKind, RefTarget, Severity,
};

use crate::appliers::{self, TraitApplier};
use crate::cache::TraitScope;
use crate::context::{BoundArgument, ResolutionPhase, ResolveContext, ScopeFrame};
use crate::error::Result;
use crate::references::is_resolved_attribute_path;
use crate::resolver::Resolver;
use crate::traits::ParameterValue;

/// Visit every object and check its minimal shape.
#[instrument(skip_all)]
pub(crate) fn integrity(graph: &ObjectGraph, ctx: &mut ResolveContext) {
    for document in graph.documents() {
        let doc_path = document.path().to_string();
        walk_document(graph, document.id(), &mut |event, id, path| {
            if event != WalkEvent::Enter {
                return false;
            }
            let Some(data) = graph.data(id) else {
                return false;
            };
            let missing = integrity::missing_fields(data);
            if !missing.is_empty() {
                ctx.report(Diagnostic::new(
                    ErrorKind::StructuralIntegrity,
                    format!("{}/{}", doc_path, path),
                    format!("{} is missing {}", data.kind().name(), missing.join(", ")),
                ));
            }
            false
        });
    }
}

/// Record every named definition at its document-relative path and stamp
/// corpus paths.
#[instrument(skip_all)]
pub(crate) fn declarations(graph: &mut ObjectGraph, ctx: &mut ResolveContext) {
    for doc in graph.document_ids() {
        let mut visited: Vec<(ObjectId, String, bool)> = Vec::new();
        walk_document(graph, doc, &mut |event, id, path| {
            if event == WalkEvent::Enter {
                let declarable = graph
                    .get(id)
                    .is_some_and(|o| !o.kind().is_reference() && o.name().is_some());
                visited.push((id, path.to_string(), declarable));
            }
            false
        });

        let Some(document) = graph.document_mut(doc) else {
            continue;
        };
        let doc_path = document.path().to_string();
        document.clear_declarations();
        for (id, path, declarable) in visited {
            if declarable {
                if let Err(existing) = document.declare(path.clone(), id) {
                    ctx.report(Diagnostic::new(
                        ErrorKind::DuplicateDeclaration,
                        format!("{}/{}", doc_path, path),
                        format!("'{}' is already declared by {}", path, existing),
                    ));
                    continue;
                }
            }
            if let Some(object) = document.object_mut(id) {
                if declarable {
                    object.declared_path = Some(path.clone());
                }
                object.corpus_path = Some(format!("{}/{}", doc_path, path));
            }
        }
        tracing::debug!(%doc, declarations = document.declarations().len(), "declarations recorded");
    }
}

fn named_references(graph: &ObjectGraph, doc: DocId) -> Vec<(ObjectId, RefKind, String)> {
    let Some(document) = graph.document(doc) else {
        return Vec::new();
    };
    document
        .objects()
        .iter()
        .filter_map(|o| match &o.data {
            ObjectData::Reference(r) => match &r.target {
                RefTarget::Named(name) => Some((o.id, r.kind, name.clone())),
                RefTarget::Explicit(_) => None,
            },
            _ => None,
        })
        .collect()
}

fn report_unresolved(resolver: &mut Resolver<'_>, reference: ObjectId, kind: RefKind, name: &str) {
    let path = resolver.path_of(reference);
    let severity = if kind == RefKind::Entity {
        Severity::Warning
    } else {
        Severity::Error
    };
    resolver.report(Diagnostic::with_severity(
        ErrorKind::UnresolvedReference,
        severity,
        path,
        format!("unable to resolve {} reference '{}'", kind.name(), name),
    ));
}

/// Resolve every named reference, except resolved-attribute paths.
#[instrument(skip_all)]
pub(crate) fn references(
    graph: &ObjectGraph,
    ctx: &mut ResolveContext,
    phase: ResolutionPhase,
) -> Result<()> {
    let mut resolver = Resolver::new(graph, ctx, phase);
    for doc in graph.document_ids() {
        for (reference, kind, name) in named_references(graph, doc) {
            if is_resolved_attribute_path(&name) {
                continue;
            }
            if resolver.resolve_reference(reference, doc)?.is_none() {
                report_unresolved(&mut resolver, reference, kind, &name);
            }
        }
    }
    Ok(())
}

/// Trait references with the scope they appear in, in walk order.
fn trait_references(graph: &ObjectGraph, doc: DocId) -> Vec<(ObjectId, ScopeFrame)> {
    let mut found = Vec::new();
    let mut stack: Vec<ScopeFrame> = Vec::new();
    walk_document(graph, doc, &mut |event, id, _| {
        let Some(data) = graph.data(id) else {
            return false;
        };
        let top = stack.last().copied().unwrap_or_default();
        let frame = match data {
            ObjectData::Entity(_) => Some(ScopeFrame {
                entity: Some(id),
                ..ScopeFrame::default()
            }),
            ObjectData::TypeAttribute(_) | ObjectData::EntityAttribute(_) => Some(ScopeFrame {
                attribute: Some(id),
                ..top
            }),
            ObjectData::Reference(r) if r.kind == RefKind::Trait => Some(ScopeFrame {
                trait_ref: Some(id),
                ..top
            }),
            _ => None,
        };
        let Some(frame) = frame else {
            return false;
        };
        match event {
            WalkEvent::Enter => {
                if frame.trait_ref == Some(id) {
                    found.push((id, frame));
                }
                stack.push(frame);
            }
            WalkEvent::Leave => {
                stack.pop();
            }
        }
        false
    });
    found
}

/// The reference kind a parameter's data type demands, found by walking the
/// data type's extends chain for a kind name.
fn expected_kind(resolver: &mut Resolver<'_>, data_type: ObjectId, wrt: DocId) -> Result<Option<RefKind>> {
    let mut current = match resolver.data(data_type) {
        Some(ObjectData::Reference(_)) => resolver.reference_definition(data_type, wrt)?,
        Some(_) => Some(data_type),
        None => None,
    };
    let mut visited = HashSet::new();
    while let Some(definition) = current {
        if !visited.insert(definition) {
            break;
        }
        let Some(data) = resolver.data(definition) else {
            break;
        };
        if let Some(kind) = data.name().and_then(RefKind::from_type_name) {
            return Ok(Some(kind));
        }
        current = match data.extends() {
            Some(extends) => resolver.reference_definition(extends, wrt)?,
            None => None,
        };
    }
    Ok(None)
}

/// Whether an object argument is acceptable where `kind` is expected.
fn object_matches(resolver: &Resolver<'_>, object: ObjectId, kind: RefKind) -> bool {
    match resolver.data(object) {
        Some(ObjectData::Reference(r)) => r.kind == kind,
        Some(data) => kind.accepts(data.kind()),
        None => false,
    }
}

/// Bind arguments to parameters and type-check values of reference-typed
/// parameters.
#[instrument(skip_all)]
pub(crate) fn parameters(
    graph: &ObjectGraph,
    ctx: &mut ResolveContext,
    phase: ResolutionPhase,
) -> Result<()> {
    ctx.replacements.clear();
    let mut resolver = Resolver::new(graph, ctx, phase);
    for doc in graph.document_ids() {
        for (trait_ref, frame) in trait_references(graph, doc) {
            resolver.ctx.scope.push(frame);
            let bound = bind_trait_reference(&mut resolver, trait_ref, doc);
            resolver.ctx.scope.pop();
            bound?;
        }
    }
    tracing::debug!(replacements = resolver.ctx.replacements.len(), "parameters bound");
    Ok(())
}

fn bind_trait_reference(resolver: &mut Resolver<'_>, trait_ref: ObjectId, wrt: DocId) -> Result<()> {
    let Some(r) = resolver.data(trait_ref).and_then(ObjectData::as_reference) else {
        return Ok(());
    };
    let Some(definition) = resolver.reference_definition(trait_ref, wrt)? else {
        return Ok(());
    };
    let Some(signature) = resolver.trait_signature(definition, wrt)? else {
        return Ok(());
    };
    let parameters = signature.parameters.clone();

    let mut supplied: Vec<Option<&ArgumentValue>> = vec![None; parameters.len()];
    for (ordinal, argument) in r.arguments.iter().enumerate() {
        let index = match &argument.name {
            Some(name) => parameters.resolve_name(name)?,
            None => parameters.resolve_ordinal(ordinal)?,
        };
        supplied[index] = Some(&argument.value);
    }

    for (index, parameter) in parameters.iter().enumerate() {
        let Some(data_type) = parameter.data_type else {
            continue;
        };
        let (value, explicit, from) = match (supplied[index], &parameter.default) {
            (Some(value), _) => (value, true, trait_ref.doc()),
            (None, Some(default)) => (default, false, parameter.id.doc()),
            (None, None) => continue,
        };
        let Some(kind) = expected_kind(resolver, data_type, wrt)? else {
            continue;
        };

        let replacement = match value {
            ArgumentValue::Text(text) => {
                let scope = resolver.ctx.scope();
                let this = match text.as_str() {
                    "this.attribute" => Some(scope.attribute),
                    "this.trait" => Some(scope.trait_ref),
                    "this.entity" => Some(scope.entity),
                    _ => None,
                };
                match this {
                    Some(Some(object)) => Some(ParameterValue::Object(object)),
                    Some(None) => {
                        let path = resolver.path_of(trait_ref);
                        resolver.report(Diagnostic::new(
                            ErrorKind::ParameterType,
                            path,
                            format!("'{}' has nothing in scope for parameter '{}'", text, parameter.name),
                        ));
                        None
                    }
                    None => Some(ParameterValue::Named {
                        kind,
                        name: text.clone(),
                        from,
                    }),
                }
            }
            ArgumentValue::Object(object) => {
                if !object_matches(resolver, *object, kind) {
                    let path = resolver.path_of(trait_ref);
                    let found = resolver
                        .data(*object)
                        .map(|d| d.kind().name())
                        .unwrap_or("nothing");
                    resolver.report(Diagnostic::new(
                        ErrorKind::ParameterType,
                        path,
                        format!(
                            "parameter '{}' expects {} but was given {}",
                            parameter.name,
                            kind.name(),
                            found
                        ),
                    ));
                }
                None
            }
        };
        if let Some(value) = replacement {
            resolver
                .ctx
                .replacements
                .insert((trait_ref, index), BoundArgument { value, explicit });
        }
    }
    Ok(())
}

/// Attach appliers, force trait resolution, and check required parameters.
#[instrument(skip_all)]
pub(crate) fn traits(
    graph: &ObjectGraph,
    ctx: &mut ResolveContext,
    phase: ResolutionPhase,
) -> Result<()> {
    let mut resolver = Resolver::new(graph, ctx, phase);

    resolver.ctx.appliers.clear();
    for doc in graph.document_ids() {
        let Some(document) = graph.document(doc) else {
            continue;
        };
        for object in document.objects() {
            if object.kind() != ObjectKind::TraitDef {
                continue;
            }
            let bound = bind_appliers(&mut resolver, object.id, doc)?;
            if !bound.is_empty() {
                resolver.ctx.appliers.insert(object.id, bound);
            }
        }
    }
    tracing::debug!(traits = resolver.ctx.appliers.len(), "appliers attached");
    resolver.ctx.cache.clear_derived();

    for doc in graph.document_ids() {
        let Some(document) = graph.document(doc) else {
            continue;
        };
        for object in document.objects() {
            let forced = matches!(
                object.kind(),
                ObjectKind::TraitDef
                    | ObjectKind::RelationshipDef
                    | ObjectKind::DataTypeDef
                    | ObjectKind::EntityDef
                    | ObjectKind::AttributeGroupDef
                    | ObjectKind::TypeAttributeDef
                    | ObjectKind::EntityAttributeDef
            );
            if forced {
                resolver.resolve_all_traits(object.id, doc)?;
            }
        }
        for object in document.objects() {
            let members: &[ObjectId] = match &object.data {
                ObjectData::Entity(def) => &def.attributes,
                ObjectData::AttributeGroup(def) => &def.members,
                _ => continue,
            };
            check_required(&mut resolver, object.id, doc)?;
            for &member in members {
                if resolver.data(member).is_some_and(|d| d.kind().is_attribute()) {
                    check_required(&mut resolver, member, doc)?;
                }
            }
        }
    }
    Ok(())
}

/// Library appliers matching any name in the trait's ancestry, nearest
/// ancestor first.
fn bind_appliers(
    resolver: &mut Resolver<'_>,
    trait_def: ObjectId,
    wrt: DocId,
) -> Result<Vec<&'static TraitApplier>> {
    let mut bound: Vec<&'static TraitApplier> = Vec::new();
    let mut current = Some(trait_def);
    let mut visited = HashSet::new();
    while let Some(definition) = current {
        if !visited.insert(definition) {
            break;
        }
        let Some(def) = resolver.data(definition).and_then(ObjectData::as_trait) else {
            break;
        };
        for applier in appliers::for_name(&def.name) {
            if !bound.iter().any(|b| std::ptr::eq(*b, applier)) {
                bound.push(applier);
            }
        }
        current = match def.extends {
            Some(extends) => resolver.reference_definition(extends, wrt)?,
            None => None,
        };
    }
    Ok(bound)
}

/// Report required parameters without a value on any trait of `object`.
fn check_required(resolver: &mut Resolver<'_>, object: ObjectId, wrt: DocId) -> Result<()> {
    let traits = resolver.resolve_all_traits(object, wrt)?;
    for resolved in traits.iter() {
        for (index, parameter) in resolved.signature.parameters.iter().enumerate() {
            if !parameter.required {
                continue;
            }
            let present = match resolved.values.get(index) {
                Some(ParameterValue::Text(text)) => !text.is_empty(),
                Some(_) => true,
                None => false,
            };
            if !present {
                let path = resolver.path_of(object);
                resolver.report(Diagnostic::new(
                    ErrorKind::MissingRequiredParameter,
                    path,
                    format!(
                        "required parameter '{}' of trait '{}' has no value",
                        parameter.name,
                        resolved.name()
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Resolve attributes of every entity and attribute group.
#[instrument(skip_all)]
pub(crate) fn attributes(
    graph: &ObjectGraph,
    ctx: &mut ResolveContext,
    phase: ResolutionPhase,
) -> Result<()> {
    let mut resolver = Resolver::new(graph, ctx, phase);
    for doc in graph.document_ids() {
        let Some(document) = graph.document(doc) else {
            continue;
        };
        for object in document.objects() {
            if matches!(object.kind(), ObjectKind::EntityDef | ObjectKind::AttributeGroupDef) {
                resolver.resolve_attributes(object.id, doc)?;
            }
        }
    }
    Ok(())
}

/// Validate resolved-attribute references, then discover entity references.
#[instrument(skip_all)]
pub(crate) fn entity_references(
    graph: &ObjectGraph,
    ctx: &mut ResolveContext,
    phase: ResolutionPhase,
) -> Result<()> {
    let mut resolver = Resolver::new(graph, ctx, phase);
    for doc in graph.document_ids() {
        for (reference, kind, name) in named_references(graph, doc) {
            if !is_resolved_attribute_path(&name) {
                continue;
            }
            if resolver.resolve_reference(reference, doc)?.is_none() {
                report_unresolved(&mut resolver, reference, kind, &name);
            }
        }
    }
    for doc in graph.document_ids() {
        let Some(document) = graph.document(doc) else {
            continue;
        };
        for object in document.objects() {
            if object.kind() == ObjectKind::EntityDef {
                resolver.resolve_entity_references(object.id, doc)?;
            }
        }
    }
    Ok(())
}

/// Enable elevated traits and drop `All` sets computed without them.
pub(crate) fn finished(ctx: &mut ResolveContext, phase: &mut ResolutionPhase) {
    phase.elevated_enabled = true;
    ctx.cache.clear_trait_scope(TraitScope::All);
}
