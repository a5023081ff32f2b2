//! Job control endpoints
//!
//! - POST /jobs: start an analysis job for a local media file
//! - GET /jobs/current: state and progress of the current job
//! - POST /jobs/current/cancel: discard the live job

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use formcheck_common::{FailureReason, JobState, SubmitMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::AnalysisJob;
use crate::services::MediaSubmission;
use crate::{ApiError, ApiResult, AppState};

/// POST /jobs request
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    /// Local path of the media file to analyze
    pub file_path: String,
    pub muscle_group: Option<String>,
    pub exercise_name: Option<String>,
    #[serde(default)]
    pub mode: SubmitMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobFailureResponse {
    pub reason: FailureReason,
    pub message: String,
    pub detail: String,
}

/// Job status; `job_id` is absent while idle
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Option<Uuid>,
    pub state: JobState,
    pub mode: Option<SubmitMode>,
    pub progress_text: Option<String>,
    pub percentage: u8,
    pub video_id: Option<String>,
    pub filename: Option<String>,
    pub failure: Option<JobFailureResponse>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobStatusResponse {
    pub fn idle() -> Self {
        Self {
            job_id: None,
            state: JobState::Idle,
            mode: None,
            progress_text: None,
            percentage: 0,
            video_id: None,
            filename: None,
            failure: None,
            started_at: None,
            ended_at: None,
        }
    }
}

impl From<AnalysisJob> for JobStatusResponse {
    fn from(job: AnalysisJob) -> Self {
        Self {
            job_id: Some(job.id),
            state: job.state,
            mode: Some(job.mode),
            progress_text: Some(job.progress.text),
            percentage: job.progress.percentage,
            video_id: job.video_id,
            filename: Some(job.submission.filename),
            failure: job.failure.map(|f| JobFailureResponse {
                reason: f.reason,
                message: f.reason.status_message().to_string(),
                detail: f.detail,
            }),
            started_at: Some(job.started_at),
            ended_at: job.ended_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    pub job_id: Option<Uuid>,
}

/// POST /jobs
///
/// Reads the file, then starts the job in the background. Any job already
/// running is cancelled first.
pub async fn start_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> ApiResult<(StatusCode, Json<JobStatusResponse>)> {
    let path = Path::new(request.file_path.trim());
    if path.as_os_str().is_empty() {
        return Err(ApiError::BadRequest("file_path is required".to_string()));
    }

    let payload = tokio::fs::read(path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Cannot read media file");
        match e.kind() {
            std::io::ErrorKind::NotFound => ApiError::NotFound(format!("Media file {}", path.display())),
            _ => ApiError::Io(e),
        }
    })?;
    if payload.is_empty() {
        return Err(ApiError::BadRequest(format!("Media file {} is empty", path.display())));
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());

    info!(filename = %filename, bytes = payload.len(), "Job requested");

    let job = state
        .orchestrator
        .start_job(MediaSubmission {
            filename,
            muscle_group: request.muscle_group,
            exercise_name: request.exercise_name,
            mode: request.mode,
            payload,
        })
        .await;

    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

/// GET /jobs/current
pub async fn current_job(State(state): State<AppState>) -> Json<JobStatusResponse> {
    let status = state
        .orchestrator
        .current_job()
        .await
        .map(JobStatusResponse::from)
        .unwrap_or_else(JobStatusResponse::idle);
    Json(status)
}

/// POST /jobs/current/cancel
pub async fn cancel_job(State(state): State<AppState>) -> Json<CancelResponse> {
    let job_id = state.orchestrator.cancel_current().await;
    Json(CancelResponse {
        cancelled: job_id.is_some(),
        job_id,
    })
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(start_job))
        .route("/jobs/current", get(current_job))
        .route("/jobs/current/cancel", post(cancel_job))
}
