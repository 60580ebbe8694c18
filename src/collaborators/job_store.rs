//! Durable storage for [`Job`] state (spec §6: "Job store... persist and
//! retrieve job state").
//!
//! Grounded on the original's `app/storage/job_store.py` (one JSON file per
//! job, atomic write-tmp-then-rename, `base_dir` created on construction) and
//! on the teacher's `Checkpointer` trait (`runtimes/checkpointer.rs`) for the
//! Rust shape: an async trait over `Send + Sync` implementors, a dedicated
//! `thiserror`/`miette` error enum, and a reference in-process/file-backed
//! implementation rather than a lazily-constructed singleton.

use std::path::PathBuf;

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Job;

#[derive(Debug, Error, Diagnostic)]
pub enum JobStoreError {
    #[error("job not found: {job_id}")]
    #[diagnostic(code(folio_enrich::job_store::not_found))]
    NotFound { job_id: String },

    #[error("i/o error for job {job_id}: {source}")]
    #[diagnostic(code(folio_enrich::job_store::io))]
    Io {
        job_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize job {job_id}: {source}")]
    #[diagnostic(code(folio_enrich::job_store::serde))]
    Serde {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, JobStoreError>;

/// Persists and retrieves [`Job`] snapshots, one per job id.
///
/// Implementations must make `save` atomic: a crash mid-write must never
/// leave `load` observing a partially written job (spec §6).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, job: &Job) -> Result<()>;
    async fn load(&self, job_id: &str) -> Result<Option<Job>>;
    async fn list(&self) -> Result<Vec<Job>>;
    async fn delete(&self, job_id: &str) -> Result<bool>;
}

/// Reference implementation: one `<job_id>.json` file per job under
/// `base_dir`, written via a `.tmp` sibling file renamed into place.
///
/// A direct port of `job_store.py`'s `save`: write to a temp file created in
/// the same directory (so the rename is same-filesystem and therefore
/// atomic on POSIX), then rename over the final path. On any failure the
/// temp file is removed rather than left behind.
pub struct FileJobStore {
    base_dir: PathBuf,
}

impl FileJobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.base_dir.join(format!("{job_id}.json"))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        let path = self.job_path(&job.id);
        let data = serde_json::to_vec_pretty(job).map_err(|source| JobStoreError::Serde {
            job_id: job.id.clone(),
            source,
        })?;

        let tmp_path = self.base_dir.join(format!("{}.{}.tmp", job.id, Uuid::new_v4()));
        let io_err = |source: std::io::Error| JobStoreError::Io {
            job_id: job.id.clone(),
            source,
        };

        let write_result = tokio::fs::write(&tmp_path, &data).await;
        if let Err(source) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(source));
        }

        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(source));
        }

        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<Job>> {
        let path = self.job_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read(&path).await.map_err(|source| JobStoreError::Io {
            job_id: job_id.to_string(),
            source,
        })?;
        let job = serde_json::from_slice(&data).map_err(|source| JobStoreError::Serde {
            job_id: job_id.to_string(),
            source,
        })?;
        Ok(Some(job))
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let mut entries = tokio::fs::read_dir(&self.base_dir)
            .await
            .map_err(|source| JobStoreError::Io {
                job_id: String::new(),
                source,
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| JobStoreError::Io {
            job_id: String::new(),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut jobs = Vec::with_capacity(paths.len());
        for path in paths {
            if let Ok(data) = tokio::fs::read(&path).await {
                if let Ok(job) = serde_json::from_slice(&data) {
                    jobs.push(job);
                }
            }
        }
        Ok(jobs)
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        let path = self.job_path(job_id);
        if !path.exists() {
            return Ok(false);
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| JobStoreError::Io {
                job_id: job_id.to_string(),
                source,
            })?;
        Ok(true)
    }
}

/// In-process reference implementation used by tests and small
/// single-replica deployments that do not need cross-process durability.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<FxHashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        self.jobs.write().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().get(job_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        Ok(self.jobs.write().remove(job_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentInput;

    #[tokio::test]
    async fn file_store_round_trips_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path()).unwrap();
        let job = Job::new(DocumentInput::plain_text("hello world"));

        store.save(&job).await.unwrap();
        let loaded = store.load(&job.id).await.unwrap().expect("job present");
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.document.content, "hello world");

        assert!(store.delete(&job.id).await.unwrap());
        assert!(store.load(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_job_returns_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path()).unwrap();
        assert!(store.load("does-not-exist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryJobStore::new();
        let job = Job::new(DocumentInput::plain_text("hi"));
        store.save(&job).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete(&job.id).await.unwrap());
    }
}
