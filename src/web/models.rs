//! Contains the data models for API requests and responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::job::{Job, JobStatus};

/// Response for a freshly created job.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Projection of a job for status polling.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Response for an accepted print dispatch.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintDispatchedResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Uniform error body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body for the health probe.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
