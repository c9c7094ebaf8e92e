//! In-memory job store: the single source of truth for job identity and
//! status. The store enforces storage semantics only; state-transition
//! preconditions live with the components that drive the pipeline.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Pipeline status of a job.
///
/// Transitions run forward only:
/// `uploaded → slicing → sliced → printing → completed`, with `failed`
/// reachable from `slicing` and `printing`. `completed` and `failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Slicing,
    Sliced,
    Printing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Slicing => "slicing",
            JobStatus::Sliced => "sliced",
            JobStatus::Printing => "printing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One request to convert and print a single model file.
///
/// `output_path` is set exactly when a slice has succeeded; `error` is set
/// exactly when the job has failed.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub model_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update merged into an existing job record. Unset fields are left
/// untouched; `output_path` distinguishes "untouched" (`None`) from
/// "cleared" (`Some(None)`) so a failure can drop a stale artifact path.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub output_path: Option<Option<PathBuf>>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// Update only the status.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Mark the job sliced with its artifact path.
    pub fn sliced(output_path: impl Into<PathBuf>) -> Self {
        Self {
            status: Some(JobStatus::Sliced),
            output_path: Some(Some(output_path.into())),
            error: None,
        }
    }

    /// Mark the job failed with a descriptive cause. Clears any artifact
    /// path so `output_path` stays tied to the live pipeline states.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            output_path: Some(None),
            error: Some(error.into()),
        }
    }
}

/// Why a conditional update did not apply. The record is untouched in
/// either case.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("job status is {actual}, not {expected}")]
    StatusMismatch {
        expected: JobStatus,
        actual: JobStatus,
    },
}

/// Shared handle to the job map. Cloning is cheap; all clones see the same
/// records. Reads return copies; every mutation goes through [`update`]
/// under a single write-lock acquisition so same-id read-modify-write never
/// interleaves.
///
/// [`update`]: JobStore::update
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new job for the given model file. Infallible.
    pub async fn create(&self, model_path: impl Into<PathBuf>) -> Job {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            status: JobStatus::Uploaded,
            model_path: model_path.into(),
            output_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(job.id, job.clone());
        tracing::info!(job_id = %job.id, model = %job.model_path.display(), "job created");
        job
    }

    /// Look up a job by id. `None` is a normal outcome (stale polls).
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Merge the given fields into an existing record and refresh
    /// `updated_at`. Returns the updated record, or `None` for an unknown
    /// id (no record is created).
    pub async fn update(&self, id: Uuid, update: JobUpdate) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        apply(job, update);
        Some(job.clone())
    }

    /// Merge the given fields only if the job's current status equals
    /// `expected`. Check and merge happen under the same write-lock
    /// acquisition, so two callers racing for the same transition cannot
    /// both win. The store still knows nothing about the transition graph;
    /// the caller names the state it requires.
    pub async fn update_if(
        &self,
        id: Uuid,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<Job, UpdateError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(UpdateError::NotFound(id))?;
        if job.status != expected {
            return Err(UpdateError::StatusMismatch {
                expected,
                actual: job.status,
            });
        }
        apply(job, update);
        Ok(job.clone())
    }
}

fn apply(job: &mut Job, update: JobUpdate) {
    if let Some(status) = update.status {
        job.status = status;
    }
    if let Some(output_path) = update.output_path {
        job.output_path = output_path;
    }
    if let Some(error) = update.error {
        job.error = Some(error);
    }
    job.updated_at = Utc::now();
}
