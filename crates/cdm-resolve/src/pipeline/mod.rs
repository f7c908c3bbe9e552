//! Resolution pipeline.
//!
//! Stages run strictly in order over every loaded document, with a barrier
//! between stages:
//!
//! `start → imports → integrity → declarations → references → parameters →
//! traits → attributes → entityReferences → finished`
//!
//! A nonzero error count at a stage boundary moves the run to
//! [`Stage::Error`] and nothing further runs. Callers choose the first and
//! last stage; the stage actually reached is returned.

pub mod imports;
pub mod stages;

use std::fmt;

use cdm_object_model::{Diagnostic, ErrorKind, ObjectGraph};

use crate::context::{ResolutionPhase, ResolveContext};
use crate::error::Result;

pub use imports::{DocumentLoader, LoadRequest};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    Imports,
    Integrity,
    Declarations,
    References,
    Parameters,
    Traits,
    Attributes,
    EntityReferences,
    Finished,
    Error,
}

impl Stage {
    /// The ten regular stages, in order.
    pub const ORDER: [Stage; 10] = [
        Stage::Start,
        Stage::Imports,
        Stage::Integrity,
        Stage::Declarations,
        Stage::References,
        Stage::Parameters,
        Stage::Traits,
        Stage::Attributes,
        Stage::EntityReferences,
        Stage::Finished,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Imports => "imports",
            Stage::Integrity => "integrity",
            Stage::Declarations => "declarations",
            Stage::References => "references",
            Stage::Parameters => "parameters",
            Stage::Traits => "traits",
            Stage::Attributes => "attributes",
            Stage::EntityReferences => "entityReferences",
            Stage::Finished => "finished",
            Stage::Error => "error",
        }
    }

    /// The stage after this one; `Finished` and `Error` have none.
    pub fn next(self) -> Option<Stage> {
        let position = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(position + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one stage over the whole graph.
pub(crate) fn run_stage(
    graph: &mut ObjectGraph,
    ctx: &mut ResolveContext,
    phase: &mut ResolutionPhase,
    stage: Stage,
) -> Result<()> {
    match stage {
        Stage::Start | Stage::Error => Ok(()),
        Stage::Imports => {
            imports::imports(graph, ctx);
            Ok(())
        }
        Stage::Integrity => {
            stages::integrity(graph, ctx);
            Ok(())
        }
        Stage::Declarations => {
            stages::declarations(graph, ctx);
            Ok(())
        }
        Stage::References => stages::references(graph, ctx, *phase),
        Stage::Parameters => stages::parameters(graph, ctx, *phase),
        Stage::Traits => stages::traits(graph, ctx, *phase),
        Stage::Attributes => stages::attributes(graph, ctx, *phase),
        Stage::EntityReferences => stages::entity_references(graph, ctx, *phase),
        Stage::Finished => {
            stages::finished(ctx, phase);
            Ok(())
        }
    }
}

/// Run every stage after `from` up to and including `through`.
///
/// # Returns
///
/// The last stage completed, or [`Stage::Error`] if a stage left errors
/// behind. `through` at or before `from` runs nothing and returns `from`.
pub(crate) fn run(
    graph: &mut ObjectGraph,
    ctx: &mut ResolveContext,
    phase: &mut ResolutionPhase,
    from: Stage,
    through: Stage,
) -> Result<Stage> {
    if from == Stage::Error {
        return Ok(Stage::Error);
    }
    ctx.reset_error_count();
    let mut reached = from;
    while reached < through {
        let Some(stage) = reached.next() else {
            break;
        };
        if stage == Stage::Error {
            break;
        }
        tracing::info!(%stage, "stage starting");
        run_stage(graph, ctx, phase, stage)?;
        if ctx.error_count() > 0 {
            tracing::info!(%stage, errors = ctx.error_count(), "stage failed");
            return Ok(Stage::Error);
        }
        ctx.report(Diagnostic::note(
            ErrorKind::Progress,
            "",
            format!("stage '{stage}' complete"),
        ));
        reached = stage;
    }
    Ok(reached)
}
