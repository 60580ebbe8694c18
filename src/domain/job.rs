//! Job state: the unit of work persisted between stages (spec §4.1, §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::annotation::Annotation;
use super::chunk::CanonicalText;
use super::document::DocumentInput;
use super::individual::Individual;
use super::property::PropertyAnnotation;
use super::scratch::PipelineScratch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// The top-level type persisted by a [`crate::collaborators::job_store::JobStore`]
/// after every stage (spec §4.1: "the orchestrator persists job state after
/// every stage, not just at phase boundaries").
///
/// `scratch` carries intermediate per-stage metadata (spec §9 design note);
/// `annotations`/`individuals`/`properties` are the externally visible result
/// accumulated and refined stage over stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub document: DocumentInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_text: Option<CanonicalText>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub individuals: Vec<Individual>,
    #[serde(default)]
    pub properties: Vec<PropertyAnnotation>,
    #[serde(default)]
    pub scratch: PipelineScratch,
    #[serde(default)]
    pub completed_stages: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(document: DocumentInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            document,
            canonical_text: None,
            annotations: Vec::new(),
            individuals: Vec::new(),
            properties: Vec::new(),
            scratch: PipelineScratch::default(),
            completed_stages: Vec::new(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_stage_complete(&mut self, stage: impl Into<String>) {
        self.completed_stages.push(stage.into());
        self.touch();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.touch();
    }
}

/// Read-only projection returned to API callers once a job finishes (spec
/// §7). Kept distinct from [`Job`] so storage-internal fields (`scratch`,
/// `completed_stages`) never leak across the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub id: String,
    pub status: JobStatus,
    pub annotations: Vec<Annotation>,
    pub individuals: Vec<Individual>,
    pub properties: Vec<PropertyAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobResult {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            annotations: job.annotations.clone(),
            individuals: job.individuals.clone(),
            properties: job.properties.clone(),
            error: job.error.clone(),
        }
    }
}
