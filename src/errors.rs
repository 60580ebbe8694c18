//! Crate-wide error aggregation.
//!
//! Individual modules define their own `thiserror` leaf errors with
//! `miette::Diagnostic` annotations (see `node.rs` and `checkpointer.rs` in
//! the teacher framework this crate grew out of). [`CoreError`] aggregates
//! them for callers that want a single error type at the orchestrator
//! boundary.

use miette::Diagnostic;
use thiserror::Error;

use crate::collaborators::job_store::JobStoreError;
use crate::orchestrator::stage::StageError;

/// Top-level error type returned by the orchestrator and public entry points.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    /// A stage failed in a phase where failure aborts the pipeline.
    #[error("stage failed: {0}")]
    #[diagnostic(code(folio_enrich::stage_failed))]
    Stage(#[from] StageError),

    /// The job store could not read or write a job.
    #[error("job store error: {0}")]
    #[diagnostic(code(folio_enrich::job_store))]
    JobStore(#[from] JobStoreError),

    /// The caller supplied a document in an unsupported format, or asked for
    /// an unknown job/annotation/concept id.
    #[error("invalid request: {0}")]
    #[diagnostic(code(folio_enrich::invalid_request), help("{0}"))]
    InvalidRequest(String),

    /// A stage returned a state the orchestrator considers internally
    /// inconsistent (spec §7: "internal invariant violations... fatal").
    #[error("internal invariant violated: {0}")]
    #[diagnostic(code(folio_enrich::invariant))]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
