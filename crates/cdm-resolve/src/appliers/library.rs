//! Standard applier library.

use linkme::distributed_slice;

use super::{ApplierContext, ContinuationState, Synthesized, TraitApplier, TRAIT_APPLIERS};
use crate::attributes::ResolvedAttribute;
use crate::error::Result;
use crate::traits::{merge_trait_shared, ParameterValue, ResolvedTrait};

const UNSPECIFIED_SOURCE: &str = "(unspecified)";

#[distributed_slice(TRAIT_APPLIERS)]
static IS_REMOVED: TraitApplier = TraitApplier {
    match_name: "is.removed",
    priority: 10,
    will_apply: None,
    attribute_apply: None,
    attribute_add: None,
    attribute_remove: Some(remove_always),
};

#[distributed_slice(TRAIT_APPLIERS)]
static DOES_ADD_ATTRIBUTE: TraitApplier = TraitApplier {
    match_name: "does.addAttribute",
    priority: 4,
    will_apply: None,
    attribute_apply: None,
    attribute_add: Some(add_attribute),
    attribute_remove: None,
};

#[distributed_slice(TRAIT_APPLIERS)]
static DOES_ADD_SUPPORTING_ATTRIBUTE: TraitApplier = TraitApplier {
    match_name: "does.addSupportingAttribute",
    priority: 8,
    will_apply: None,
    attribute_apply: None,
    attribute_add: Some(add_supporting_attribute),
    attribute_remove: None,
};

#[distributed_slice(TRAIT_APPLIERS)]
static DOES_REFERENCE_ENTITY: TraitApplier = TraitApplier {
    match_name: "does.referenceEntity",
    priority: 4,
    will_apply: None,
    attribute_apply: None,
    attribute_add: None,
    attribute_remove: Some(keep_added_attribute_only),
};

#[distributed_slice(TRAIT_APPLIERS)]
static IS_ARRAY: TraitApplier = TraitApplier {
    match_name: "is.array",
    priority: 6,
    will_apply: Some(array_will_apply),
    attribute_apply: None,
    attribute_add: Some(expand_array),
    attribute_remove: Some(remove_array_template),
};

#[distributed_slice(TRAIT_APPLIERS)]
static DOES_RENAME_WITH_FORMAT: TraitApplier = TraitApplier {
    match_name: "does.renameWithFormat",
    priority: 6,
    will_apply: None,
    attribute_apply: Some(rename_with_format),
    attribute_add: None,
    attribute_remove: None,
};

fn remove_always(
    _ctx: &mut ApplierContext<'_, '_>,
    _resolved: &ResolvedTrait,
    _attribute: &ResolvedAttribute,
) -> Result<bool> {
    Ok(true)
}

/// Copy of the `addedAttribute` definition, plus `appliedTrait` if given.
fn added_attribute(
    ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
) -> Result<Option<ResolvedAttribute>> {
    let Some(value) = resolved.value("addedAttribute").cloned() else {
        return Ok(None);
    };
    let Some(definition) = ctx.definition_of(&value)? else {
        return Ok(None);
    };
    let Some(mut attribute) = ctx.attribute_from_definition(definition)? else {
        return Ok(None);
    };
    if let Some(applied) = resolved.value("appliedTrait").cloned() {
        if let Some(extra) = ctx.trait_from_value(&applied)? {
            merge_trait_shared(attribute.traits_mut(), &extra);
        }
    }
    Ok(Some(attribute))
}

fn add_attribute(
    ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
    _source: Option<&ResolvedAttribute>,
    _state: Option<ContinuationState>,
) -> Result<Option<Synthesized>> {
    Ok(added_attribute(ctx, resolved)?.map(Synthesized::done))
}

fn add_supporting_attribute(
    ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
    source: Option<&ResolvedAttribute>,
    _state: Option<ContinuationState>,
) -> Result<Option<Synthesized>> {
    let Some(mut attribute) = added_attribute(ctx, resolved)? else {
        return Ok(None);
    };
    let in_support_of = match source {
        Some(source) => source.resolved_name.clone(),
        None => ctx
            .definition_name()
            .unwrap_or(UNSPECIFIED_SOURCE)
            .to_string(),
    };
    if let Some(mut support) = ctx.trait_by_name("is.addedInSupportOf")? {
        support.set_parameter_value("inSupportOf", ParameterValue::Text(in_support_of))?;
        merge_trait_shared(attribute.traits_mut(), &support);
    } else {
        tracing::debug!(attribute = %attribute.resolved_name, "is.addedInSupportOf not in scope");
    }
    Ok(Some(Synthesized::done(attribute)))
}

fn keep_added_attribute_only(
    ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
    attribute: &ResolvedAttribute,
) -> Result<bool> {
    let Some(value) = resolved.value("addedAttribute").cloned() else {
        return Ok(false);
    };
    let keep = ctx.definition_of(&value)?;
    Ok(keep != Some(attribute.target))
}

/// Progress of one array expansion.
struct ArrayExpansion {
    next: usize,
    count: usize,
    start: i64,
    rename: Option<ResolvedTrait>,
}

fn array_will_apply(
    _ctx: &mut ApplierContext<'_, '_>,
    _resolved: &ResolvedTrait,
    source: Option<&ResolvedAttribute>,
) -> Result<bool> {
    Ok(source.is_some_and(|a| a.traits().find_derived("is.array").is_some()))
}

fn expand_array(
    ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
    source: Option<&ResolvedAttribute>,
    state: Option<ContinuationState>,
) -> Result<Option<Synthesized>> {
    let Some(source) = source else {
        return Ok(None);
    };
    let mut expansion = match state.and_then(ContinuationState::downcast::<ArrayExpansion>) {
        Some(expansion) => expansion,
        None => {
            let count = resolved
                .text("fixedSize")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let rename = match resolved.value("renameTrait").cloned() {
                Some(value) => ctx.trait_from_value(&value)?,
                None => None,
            };
            let start = rename
                .as_ref()
                .and_then(|t| t.text("ordinal"))
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(0);
            ArrayExpansion {
                next: 0,
                count,
                start,
                rename,
            }
        }
    };
    if expansion.next >= expansion.count {
        return Ok(None);
    }

    let mut copy = source.clone();
    copy.previous_resolved_name = source.resolved_name.clone();
    {
        let traits = copy.traits_mut();
        if traits.find_derived("is.array").is_some() {
            std::sync::Arc::make_mut(traits).remove_derived("is.array");
        }
    }
    if let Some(rename) = &expansion.rename {
        let mut stamped = rename.clone();
        let ordinal = expansion.start + expansion.next as i64;
        if stamped.signature.parameters.index_of("ordinal").is_some() {
            stamped.set_parameter_value("ordinal", ParameterValue::Text(ordinal.to_string()))?;
        }
        merge_trait_shared(copy.traits_mut(), &stamped);
    }

    expansion.next += 1;
    let continuation = (expansion.next < expansion.count).then(|| ContinuationState::new(expansion));
    Ok(Some(Synthesized {
        attribute: copy,
        continuation,
    }))
}

fn remove_array_template(
    _ctx: &mut ApplierContext<'_, '_>,
    _resolved: &ResolvedTrait,
    attribute: &ResolvedAttribute,
) -> Result<bool> {
    Ok(attribute.traits().find_derived("is.array").is_some())
}

fn rename_with_format(
    _ctx: &mut ApplierContext<'_, '_>,
    resolved: &ResolvedTrait,
    attribute: &mut ResolvedAttribute,
) -> Result<()> {
    let Some(format) = resolved.text("renameFormat") else {
        return Ok(());
    };
    let ordinal = resolved.text("ordinal").unwrap_or("");
    attribute.resolved_name = format_name(format, &attribute.previous_resolved_name, ordinal);
    Ok(())
}

/// Substitute `{n}` (name) and `{o}` (ordinal) in a rename format.
pub fn format_name(format: &str, name: &str, ordinal: &str) -> String {
    let mut out = String::with_capacity(format.len() + name.len());
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{n}") {
            out.push_str(name);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{o}") {
            out.push_str(ordinal);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
