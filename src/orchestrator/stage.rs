//! The [`Stage`] trait: one unit of pipeline work over a [`Job`].
//!
//! Shaped after the teacher's `Node` trait (`node.rs`): a `Send + Sync`
//! async trait, a context carrying identity/telemetry handles, and a
//! dedicated `thiserror`/`miette` error enum. The original's
//! `PipelineStage` (`pipeline/stages/base.py`) contributes the actual
//! contract — `name` plus `execute(job) -> job`, mutating and returning the
//! job rather than producing a separate partial-state diff, since stages
//! here persist the whole job after every step (spec §4.1) rather than
//! merging channel updates at a barrier.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Job;

#[derive(Debug, Error, Diagnostic)]
pub enum StageError {
    #[error("stage {stage} is missing expected input: {what}")]
    #[diagnostic(code(folio_enrich::stage::missing_input))]
    MissingInput { stage: &'static str, what: &'static str },

    #[error("stage {stage} collaborator error ({collaborator}): {message}")]
    #[diagnostic(code(folio_enrich::stage::collaborator))]
    Collaborator {
        stage: &'static str,
        collaborator: &'static str,
        message: String,
    },

    #[error("stage {stage} failed: {message}")]
    #[diagnostic(code(folio_enrich::stage::failed))]
    Failed { stage: &'static str, message: String },

    #[error(transparent)]
    #[diagnostic(code(folio_enrich::stage::job_store))]
    JobStore(#[from] crate::collaborators::job_store::JobStoreError),
}

pub type Result<T> = std::result::Result<T, StageError>;

/// Which of the three orchestrator phases a stage belongs to (spec §4.1:
/// "pre-parallel (sequential)... parallel (fan-out, up to five concurrent
/// extractor stages)... post-parallel (sequential)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreParallel,
    Parallel,
    PostParallel,
}

/// Context handed to every stage invocation. Carries only what a stage needs
/// to log against — no ambient global logger lookup (spec §9, "explicit
/// construction instead of lazy singletons").
#[derive(Clone)]
pub struct StageContext {
    pub job_id: String,
    pub stage_name: &'static str,
}

impl StageContext {
    pub fn new(job_id: impl Into<String>, stage_name: &'static str) -> Self {
        Self {
            job_id: job_id.into(),
            stage_name,
        }
    }
}

/// One unit of pipeline work. Implementors mutate `job` in place and return
/// it; fatal errors abort the stage (and, depending on phase semantics, the
/// whole run — see `orchestrator::run::Orchestrator`).
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase(&self) -> Phase;

    async fn execute(&self, job: Job, ctx: &StageContext) -> Result<Job>;
}

/// Shared-ownership handle to a stage, used when building the orchestrator's
/// stage list (stages are frequently `Arc`-shared collaborators themselves).
pub type StageRef = Arc<dyn Stage>;
