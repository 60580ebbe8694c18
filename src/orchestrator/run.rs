//! The pipeline orchestrator: runs stages in three phases, persisting the
//! job after every stage (spec §4.1).
//!
//! Grounded on the original's `PipelineOrchestrator` (`pipeline/orchestrator.py`)
//! for the save-after-every-stage and fail-the-job-on-exception semantics,
//! generalized from its single sequential list into the spec's three
//! phases. The parallel phase's fan-out uses `futures_util::future::join_all`
//! over cloned jobs the way the teacher's runner drives concurrent node
//! execution within a superstep (`runtimes/runner.rs`, `run_one_superstep`),
//! adapted here to merge independent per-stage mutations back into one job
//! afterward rather than reducing into shared channels.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info, instrument};

use crate::collaborators::job_store::JobStore;
use crate::domain::{Job, JobStatus};

use super::stage::{Phase, Stage, StageContext, StageError, StageRef};

pub type Result<T> = std::result::Result<T, StageError>;

/// Declares the stage list for each phase. Built explicitly by the caller
/// (spec §9: "explicit construction instead of lazy singletons") rather than
/// discovered via a registry.
pub struct Orchestrator {
    job_store: Arc<dyn JobStore>,
    pre_parallel: Vec<StageRef>,
    parallel: Vec<StageRef>,
    post_parallel: Vec<StageRef>,
}

impl Orchestrator {
    pub fn new(job_store: Arc<dyn JobStore>) -> Self {
        Self {
            job_store,
            pre_parallel: Vec::new(),
            parallel: Vec::new(),
            post_parallel: Vec::new(),
        }
    }

    /// Register a stage, filing it under its declared [`Phase`]. Panics if
    /// a stage's `phase()` disagrees with where the caller intended to put
    /// it — callers build the pipeline once at startup, so this is a
    /// configuration bug, not a runtime condition.
    pub fn with_stage(mut self, stage: StageRef) -> Self {
        match stage.phase() {
            Phase::PreParallel => self.pre_parallel.push(stage),
            Phase::Parallel => self.parallel.push(stage),
            Phase::PostParallel => self.post_parallel.push(stage),
        }
        self
    }

    pub fn with_stages(self, stages: impl IntoIterator<Item = StageRef>) -> Self {
        stages.into_iter().fold(self, Self::with_stage)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn run(&self, mut job: Job) -> Job {
        job.status = JobStatus::Running;

        if let Err(err) = self.run_sequential(&self.pre_parallel, &mut job).await {
            return self.fail(job, err).await;
        }

        if let Err(err) = self.run_parallel(&mut job).await {
            return self.fail(job, err).await;
        }

        if let Err(err) = self.run_sequential(&self.post_parallel, &mut job).await {
            return self.fail(job, err).await;
        }

        job.complete();
        if let Err(err) = self.job_store.save(&job).await {
            error!(job_id = %job.id, %err, "failed to persist completed job");
        }
        job
    }

    async fn run_sequential(&self, stages: &[StageRef], job: &mut Job) -> Result<()> {
        for stage in stages {
            self.run_one(stage, job).await?;
        }
        Ok(())
    }

    /// The parallel phase fans out up to five concurrent extractor stages
    /// over disjoint metadata keys (spec §4.1). Each stage runs against its
    /// own clone of the job-so-far and its non-overlapping scratch fields;
    /// results are merged back sequentially once every stage finishes, so
    /// two stages racing on the same field would silently drop one's
    /// output — callers must keep each parallel stage's writes disjoint.
    async fn run_parallel(&self, job: &mut Job) -> Result<()> {
        if self.parallel.is_empty() {
            return Ok(());
        }

        let snapshot = job.clone();
        let futures = self.parallel.iter().map(|stage| {
            let stage = Arc::clone(stage);
            let job_for_stage = snapshot.clone();
            async move {
                let ctx = StageContext::new(job_for_stage.id.clone(), stage.name());
                info!(job_id = %job_for_stage.id, stage = stage.name(), "running parallel stage");
                let name = stage.name();
                (name, stage.execute(job_for_stage, &ctx).await)
            }
        });

        // A per-stage failure in this phase never aborts the pipeline (spec
        // §4.1/§7): log and skip the merge for that stage alone, continue
        // with whatever the others produced.
        let results = join_all(futures).await;
        for (name, result) in results {
            match result {
                Ok(stage_job) => merge_parallel_result(job, stage_job),
                Err(err) => {
                    error!(job_id = %job.id, stage = name, %err, "parallel stage failed, continuing without its output");
                }
            }
        }

        self.job_store.save(job).await?;
        Ok(())
    }

    async fn run_one(&self, stage: &StageRef, job: &mut Job) -> Result<()> {
        let ctx = StageContext::new(job.id.clone(), stage.name());
        info!(job_id = %job.id, stage = stage.name(), "running stage");
        let updated = stage.execute(job.clone(), &ctx).await?;
        *job = updated;
        job.mark_stage_complete(ctx.stage_name);
        self.job_store.save(job).await?;
        Ok(())
    }

    async fn fail(&self, mut job: Job, err: StageError) -> Job {
        error!(job_id = %job.id, %err, "pipeline stage failed");
        job.fail(err.to_string());
        if let Err(save_err) = self.job_store.save(&job).await {
            error!(job_id = %job.id, err = %save_err, "failed to persist failed job");
        }
        job
    }
}

/// Merge one parallel-phase stage's output job back into the accumulating
/// job, taking only the fields that stage is responsible for (its own
/// scratch contributions and any annotations/individuals/properties it
/// appended) so concurrent stages never stomp on each other's writes.
fn merge_parallel_result(accumulator: &mut Job, stage_job: Job) {
    accumulator.annotations = merge_by_id(&accumulator.annotations, stage_job.annotations, |a| &a.id);
    accumulator.individuals = merge_by_id(&accumulator.individuals, stage_job.individuals, |i| &i.id);
    accumulator.properties = merge_by_id(&accumulator.properties, stage_job.properties, |p| &p.id);

    let acc_scratch = &mut accumulator.scratch;
    let stage_scratch = stage_job.scratch;
    if !stage_scratch.ruler_concepts.is_empty() {
        acc_scratch.ruler_concepts = stage_scratch.ruler_concepts;
    }
    if !stage_scratch.llm_concepts.is_empty() {
        acc_scratch.llm_concepts = stage_scratch.llm_concepts;
    }
    if !stage_scratch.spo_triples.is_empty() {
        acc_scratch.spo_triples = stage_scratch.spo_triples;
    }
    acc_scratch.activity_log.extend(stage_scratch.activity_log);
    acc_scratch.extra.extend(stage_scratch.extra);
}

fn merge_by_id<T: Clone>(
    existing: &[T],
    incoming: Vec<T>,
    id_of: impl Fn(&T) -> &String,
) -> Vec<T> {
    let mut merged = existing.to_vec();
    let known: std::collections::HashSet<&String> = merged.iter().map(&id_of).collect();
    let known: std::collections::HashSet<String> = known.into_iter().cloned().collect();
    for item in incoming {
        if !known.contains(id_of(&item)) {
            merged.push(item);
        }
    }
    merged
}
