//! Slicing coordinator: converts a mesh file into printer-ready machine
//! instructions by driving the external slicer CLI under a hard wall-clock
//! bound, and records every outcome in the job store.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SlicerConfig;
use crate::job::{JobStatus, JobStore, JobUpdate};

/// Artifact name inside the per-job output directory.
const OUTPUT_FILE_NAME: &str = "output.gcode.3mf";

/// Outcome of one slicer run.
enum SliceOutcome {
    Success(PathBuf),
    Failure(String),
    TimedOut,
}

/// Kick off slicing for a job as a background task and return its handle.
///
/// The caller gets control back immediately; progress is observable through
/// status polls. Every exit path of the task writes the store, so a failed
/// slice is never silent. Invoke at most once per job; there is no
/// internal de-duplication.
pub fn spawn_slicing(
    store: JobStore,
    config: SlicerConfig,
    job_id: Uuid,
    model_path: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        slice_model(&store, &config, job_id, &model_path).await;
    })
}

async fn slice_model(store: &JobStore, config: &SlicerConfig, job_id: Uuid, model_path: &Path) {
    store.update(job_id, JobUpdate::status(JobStatus::Slicing)).await;

    // Job-id-scoped output directory keeps concurrent slices from
    // colliding on the artifact name.
    let output_dir = config.work_dir.join("output").join(job_id.to_string());
    if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
        tracing::error!(job_id = %job_id, "failed to create output directory: {e}");
        store
            .update(job_id, JobUpdate::failed(format!("Slicing failed: {e}")))
            .await;
        return;
    }
    let output_file = output_dir.join(OUTPUT_FILE_NAME);

    tracing::info!(
        job_id = %job_id,
        model = %model_path.display(),
        output = %output_file.display(),
        "starting slice"
    );

    match run_slicer(config, model_path, &output_file).await {
        SliceOutcome::Success(artifact) => {
            tracing::info!(job_id = %job_id, artifact = %artifact.display(), "slice completed");
            store.update(job_id, JobUpdate::sliced(artifact)).await;
        }
        SliceOutcome::Failure(message) => {
            tracing::error!(job_id = %job_id, "{message}");
            store.update(job_id, JobUpdate::failed(message)).await;
        }
        SliceOutcome::TimedOut => {
            tracing::error!(job_id = %job_id, "slice timed out after {}s", config.timeout_secs);
            store.update(job_id, JobUpdate::failed("Slicing timed out")).await;
        }
    }
}

/// Run the slicer once: spawn, race the timeout against completion, and
/// verify the artifact exists before declaring success. Exit-code success
/// alone is not a sufficient postcondition for a conversion tool.
async fn run_slicer(config: &SlicerConfig, model: &Path, output_file: &Path) -> SliceOutcome {
    let mut cmd = Command::new(&config.executable);
    cmd.arg("--export-3mf")
        .arg("--load-filament")
        .arg(config.profile_dir.join("filament.json"))
        .arg("--load-process")
        .arg(config.profile_dir.join("process.json"))
        .arg("--load-machine")
        .arg(config.profile_dir.join("machine.json"))
        .arg("--output")
        .arg(output_file)
        .arg(model)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return SliceOutcome::Failure(format!("Slicing failed: {e}")),
    };

    // Drain stderr concurrently so a chatty slicer cannot block on a full
    // pipe while we wait on it.
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        })
    });

    let timeout = Duration::from_secs(config.timeout_secs);
    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return SliceOutcome::Failure(format!("Slicing failed: {e}")),
        Err(_) => {
            // Timer won the race: terminate the process and reap it.
            let _ = child.kill().await;
            if let Some(task) = stderr_task {
                task.abort();
            }
            return SliceOutcome::TimedOut;
        }
    };

    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        let detail = if stderr.trim().is_empty() {
            status.to_string()
        } else {
            stderr.trim().to_string()
        };
        return SliceOutcome::Failure(format!("Slicing failed: {detail}"));
    }

    match tokio::fs::try_exists(output_file).await {
        Ok(true) => SliceOutcome::Success(output_file.to_path_buf()),
        _ => SliceOutcome::Failure("Slicer produced no output file".to_string()),
    }
}
