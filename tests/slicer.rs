//! Slicing coordinator tests against stub converter scripts.
//!
//! The stub receives the real CLI argument list; `$9` is the `--output`
//! value.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use meshprint::config::SlicerConfig;
use meshprint::job::{JobStatus, JobStore};
use meshprint::slicer::spawn_slicing;
use tempfile::TempDir;

fn stub_converter(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("stub-slicer.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn test_config(dir: &TempDir, executable: PathBuf, timeout_secs: u64) -> SlicerConfig {
    SlicerConfig {
        executable,
        profile_dir: dir.path().join("profiles"),
        work_dir: dir.path().to_path_buf(),
        timeout_secs,
    }
}

fn test_model(dir: &TempDir) -> PathBuf {
    let model = dir.path().join("cube.stl");
    fs::write(&model, "solid cube\nendsolid cube\n").unwrap();
    model
}

#[tokio::test]
async fn successful_slice_sets_sliced_and_output_path() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "touch \"$9\"");
    let config = test_config(&dir, exe, 5);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    assert_eq!(job.status, JobStatus::Uploaded);

    spawn_slicing(store.clone(), config, job.id, model).await.unwrap();

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Sliced);
    assert!(job.error.is_none());
    let artifact = job.output_path.unwrap();
    assert!(artifact.exists());
    assert_eq!(artifact.file_name().unwrap(), "output.gcode.3mf");
    // Output lands in a job-id-scoped directory.
    assert!(artifact.parent().unwrap().ends_with(job.id.to_string()));
}

#[tokio::test]
async fn status_is_slicing_while_converter_runs() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "sleep 1\ntouch \"$9\"");
    let config = test_config(&dir, exe, 5);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    let handle = spawn_slicing(store.clone(), config, job.id, model);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Slicing);

    handle.await.unwrap();
    assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Sliced);
}

#[tokio::test]
async fn timeout_kills_converter_and_fails_job() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "sleep 2\ntouch \"$9\"");
    let config = test_config(&dir, exe, 1);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    spawn_slicing(store.clone(), config, job.id, model).await.unwrap();

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("timed out"));
    assert!(job.output_path.is_none());

    // The shell was killed before its `touch` line; waiting past the
    // script's own schedule proves no output appears afterwards.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let output = dir
        .path()
        .join("output")
        .join(job.id.to_string())
        .join("output.gcode.3mf");
    assert!(!output.exists());
}

#[tokio::test]
async fn zero_exit_without_output_file_fails_job() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "exit 0");
    let config = test_config(&dir, exe, 5);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    spawn_slicing(store.clone(), config, job.id, model).await.unwrap();

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("produced no output file"));
    assert!(job.output_path.is_none());
}

#[tokio::test]
async fn nonzero_exit_captures_stderr() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "echo 'mesh is not manifold' >&2\nexit 3");
    let config = test_config(&dir, exe, 5);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    spawn_slicing(store.clone(), config, job.id, model).await.unwrap();

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.starts_with("Slicing failed:"));
    assert!(error.contains("mesh is not manifold"));
}

#[tokio::test]
async fn missing_executable_fails_job() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, dir.path().join("no-such-slicer"), 5);
    let store = JobStore::new();
    let model = test_model(&dir);

    let job = store.create(&model).await;
    spawn_slicing(store.clone(), config, job.id, model).await.unwrap();

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().starts_with("Slicing failed:"));
}

#[tokio::test]
async fn concurrent_slices_use_isolated_output_directories() {
    let dir = TempDir::new().unwrap();
    let exe = stub_converter(&dir, "touch \"$9\"");
    let store = JobStore::new();
    let model = test_model(&dir);

    let job_a = store.create(&model).await;
    let job_b = store.create(&model).await;
    let handle_a = spawn_slicing(
        store.clone(),
        test_config(&dir, exe.clone(), 5),
        job_a.id,
        model.clone(),
    );
    let handle_b = spawn_slicing(store.clone(), test_config(&dir, exe, 5), job_b.id, model);
    handle_a.await.unwrap();
    handle_b.await.unwrap();

    let out_a = store.get(job_a.id).await.unwrap().output_path.unwrap();
    let out_b = store.get(job_b.id).await.unwrap().output_path.unwrap();
    assert_ne!(out_a, out_b);
    assert!(out_a.exists());
    assert!(out_b.exists());
}
