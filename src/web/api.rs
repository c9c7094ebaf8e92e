//! Defines the Axum API routes and handlers.
//!
//! The handlers own request validation: unknown ids map to 404, a print
//! request against a job that is not `sliced` maps to 409, and bad uploads
//! map to 400. The pipeline itself is driven asynchronously; both slicing
//! and printing return control immediately and progress is observed via
//! `GET /status/{job_id}`.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path as PathParam, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::config::Config;
use crate::job::JobStore;
use crate::printer::{self, DispatchError, PrintTransport};
use crate::slicer;
use crate::web::models::{
    ErrorResponse, HealthResponse, JobCreatedResponse, JobStatusResponse, PrintDispatchedResponse,
};

/// Upload size cap: 100 MB.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub struct AppStateInner {
    pub store: JobStore,
    pub config: Config,
    pub transport: Box<dyn PrintTransport>,
}

pub type AppState = Arc<AppStateInner>;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_model))
        .route("/status/{job_id}", get(job_status))
        .route("/print/{job_id}", post(start_print))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Handler for model uploads: persists the file, creates a job, and fires
/// off slicing without awaiting it.
async fn upload_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobCreatedResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("model") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if extension != "stl" && extension != "obj" {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Only .obj and .stl files are accepted",
            ));
        }

        let data = field.bytes().await.map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("failed to read upload: {e}"))
        })?;

        let upload_dir = state.config.slicer.work_dir.join("uploads");
        tokio::fs::create_dir_all(&upload_dir).await.map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to create upload directory: {e}"),
            )
        })?;
        let model_path = upload_dir.join(format!("{}.{extension}", Uuid::new_v4()));
        tokio::fs::write(&model_path, &data).await.map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to store upload: {e}"),
            )
        })?;

        let job = state.store.create(&model_path).await;
        // Fire-and-forget: the task records its outcome in the store.
        let _slicing = slicer::spawn_slicing(
            state.store.clone(),
            state.config.slicer.clone(),
            job.id,
            model_path,
        );

        return Ok((
            StatusCode::ACCEPTED,
            Json(JobCreatedResponse {
                job_id: job.id,
                status: job.status,
            }),
        ));
    }

    Err(api_error(StatusCode::BAD_REQUEST, "No model file provided"))
}

/// Handler to poll a job's status.
async fn job_status(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    match state.store.get(job_id).await {
        Some(job) => Ok(Json(job.into())),
        None => Err(api_error(StatusCode::NOT_FOUND, "Job not found")),
    }
}

/// Handler to dispatch a sliced job to the printer. The `printing` claim
/// happens before the response goes out, so a racing status poll never
/// sees stale `sliced`; the two-phase transport runs in the background and
/// its final `completed`/`failed` state lands in the store.
async fn start_print(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<Uuid>,
) -> Result<(StatusCode, Json<PrintDispatchedResponse>), ApiError> {
    let job = match printer::claim_print(&state.store, job_id).await {
        Ok(job) => job,
        Err(DispatchError::NotFound(_)) => {
            return Err(api_error(StatusCode::NOT_FOUND, "Job not found"));
        }
        Err(DispatchError::NotReady(status)) => {
            return Err(api_error(
                StatusCode::CONFLICT,
                format!("Job is not ready for printing (current status: {status})"),
            ));
        }
    };

    let status = job.status;
    let task_state = state.clone();
    let _dispatch = tokio::spawn(async move {
        if let Err(e) =
            printer::run_print(&task_state.store, task_state.transport.as_ref(), &job).await
        {
            tracing::warn!(job_id = %job_id, "print dispatch did not resolve: {e}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(PrintDispatchedResponse {
            job_id,
            status,
            message: "Print dispatch started".to_string(),
        }),
    ))
}
