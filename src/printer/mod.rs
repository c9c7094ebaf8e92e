//! Printer transport: the strict two-phase hand-off of a sliced artifact to
//! a physical device (implicit-TLS file upload, then an MQTT start
//! command), and the orchestration that maps its outcome onto the job.

pub mod command;
pub mod ftp;
pub mod mqtt;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PrinterConfig;
use crate::job::{Job, JobStatus, JobStore, JobUpdate, UpdateError};

/// Errors from the printer transport. Phase 1 (transfer) and phase 2
/// (command) failures stay distinguishable by variant and message.
#[derive(Debug, Error)]
pub enum PrinterError {
    /// File-transfer phase failed (connect, login, or upload).
    #[error("file transfer failed: {0}")]
    Transfer(String),
    /// Command phase failed (connect, publish, or acknowledgment).
    #[error("command channel error: {0}")]
    Command(String),
    /// A phase exceeded its deadline.
    #[error("{0}")]
    Timeout(String),
    /// Local IO error (reading the artifact).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrinterError>;

/// Seam for handing an artifact to a device. The production implementation
/// is [`BambuTransport`]; tests substitute stubs.
#[async_trait]
pub trait PrintTransport: Send + Sync {
    /// Transfer the artifact and instruct the device to print it.
    /// Returns the remote file name used on the device.
    async fn send(&self, artifact: &Path) -> Result<String>;
}

/// Two-phase transport to a Bambu-class LAN printer: FTPS upload on port
/// 990, then a `project_file` command over MQTT on port 8883. Phase 2 is
/// never attempted if phase 1 fails.
pub struct BambuTransport {
    config: PrinterConfig,
}

impl BambuTransport {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PrintTransport for BambuTransport {
    async fn send(&self, artifact: &Path) -> Result<String> {
        let remote_name = ftp::upload_artifact(&self.config, artifact).await?;
        mqtt::send_print_command(&self.config, &remote_name).await?;
        Ok(remote_name)
    }
}

/// Refusals from [`dispatch_print`]. Both leave the job untouched.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("job is not ready for printing (current status: {0})")]
    NotReady(JobStatus),
}

/// Claim a job for printing: the `sliced` check and the `printing`
/// transition run as one compare-and-set on the store, so of any number of
/// concurrent callers exactly one wins the claim. The losers are refused
/// with `NotReady` and mutate nothing. This is what blocks double-dispatch
/// of a `printing` or `completed` job to the physical device.
pub async fn claim_print(
    store: &JobStore,
    job_id: Uuid,
) -> std::result::Result<Job, DispatchError> {
    match store
        .update_if(job_id, JobStatus::Sliced, JobUpdate::status(JobStatus::Printing))
        .await
    {
        Ok(job) => {
            tracing::info!(job_id = %job_id, "job claimed for printing");
            Ok(job)
        }
        Err(UpdateError::NotFound(_)) => Err(DispatchError::NotFound(job_id)),
        Err(UpdateError::StatusMismatch { actual, .. }) => Err(DispatchError::NotReady(actual)),
    }
}

/// Run the transport for a job already claimed via [`claim_print`] and
/// apply exactly one store write for the outcome: `completed` on success,
/// `failed` with a `Print failed:` prefix otherwise. Returns the final
/// record.
pub async fn run_print(
    store: &JobStore,
    transport: &dyn PrintTransport,
    job: &Job,
) -> std::result::Result<Job, DispatchError> {
    let Some(artifact) = job.output_path.clone() else {
        // A sliced job always carries its artifact path.
        return store
            .update(job.id, JobUpdate::failed("Print failed: job has no artifact path"))
            .await
            .ok_or(DispatchError::NotFound(job.id));
    };
    tracing::info!(job_id = %job.id, artifact = %artifact.display(), "print dispatch started");

    let update = match transport.send(&artifact).await {
        Ok(remote_name) => {
            tracing::info!(job_id = %job.id, remote = %remote_name, "print job sent to printer");
            JobUpdate::status(JobStatus::Completed)
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, "print dispatch failed: {e}");
            JobUpdate::failed(format!("Print failed: {e}"))
        }
    };
    store
        .update(job.id, update)
        .await
        .ok_or(DispatchError::NotFound(job.id))
}

/// Run one print attempt for a job: claim it, then run the transport.
pub async fn dispatch_print(
    store: &JobStore,
    transport: &dyn PrintTransport,
    job_id: Uuid,
) -> std::result::Result<Job, DispatchError> {
    let job = claim_print(store, job_id).await?;
    run_print(store, transport, &job).await
}
