//! Analysis job orchestrator
//!
//! Drives one job at a time through the analyzer:
//!
//! - Upload path: upload target → transfer → trigger → poll → fetch result
//! - Inline path: one analyze request carrying the base64 payload
//!
//! Each job runs on its own tokio task with a `CancellationToken`. Starting a
//! new job, cancelling, or shutting down cancels the token and aborts the task.
//! Every write back into the session goes through `apply`, which drops the
//! update unless the job is still current and its token is live.

use chrono::Utc;
use formcheck_common::events::{EventBus, FormcheckEvent};
use formcheck_common::{AnalysisResult, FailureReason, JobState, SubmitMode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{AnalysisJob, JobSubmission};
use crate::services::analyzer_client::{
    AnalyzerApi, ClientError, InlineAnalyzeRequest, RemoteStatus, UploadTargetRequest,
};
use crate::session::{transition, JobUpdate, Session};
use crate::utils::RetryPolicy;

/// Poll loop settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollingConfig {
    pub interval: Duration,
    /// Consecutive transport failures tolerated
    pub max_retries: u32,
    pub max_backoff: Duration,
    /// Give up after this long in `Polling`; `None` polls forever
    pub timeout: Option<Duration>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_retries: 5,
            max_backoff: Duration::from_secs(30),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub polling: PollingConfig,
    /// `Auto` submits inline up to this size
    pub inline_max_bytes: u64,
    pub user_id: String,
    pub default_muscle_group: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            inline_max_bytes: 8 * 1024 * 1024,
            user_id: String::from("local-user"),
            default_muscle_group: String::from("Chest"),
        }
    }
}

/// Media handed to `start_job`
#[derive(Debug, Clone)]
pub struct MediaSubmission {
    pub filename: String,
    pub muscle_group: Option<String>,
    pub exercise_name: Option<String>,
    pub mode: SubmitMode,
    pub payload: Vec<u8>,
}

/// Why a job task stopped early
#[derive(Debug)]
enum JobError {
    Failed { reason: FailureReason, detail: String },
    /// Token cancelled or job superseded; nothing to report
    Cancelled,
}

impl JobError {
    fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        JobError::Failed {
            reason,
            detail: detail.into(),
        }
    }
}

struct ActiveJob {
    job_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveJob {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

pub struct JobOrchestrator {
    api: Arc<dyn AnalyzerApi>,
    session: Arc<RwLock<Session>>,
    event_bus: EventBus,
    config: OrchestratorConfig,
    active: Mutex<Option<ActiveJob>>,
    /// Most recent job failure, for diagnostics
    last_error: Arc<RwLock<Option<String>>>,
}

impl JobOrchestrator {
    pub fn new(
        api: Arc<dyn AnalyzerApi>,
        session: Arc<RwLock<Session>>,
        event_bus: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            api,
            session,
            event_bus,
            config,
            active: Mutex::new(None),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Shared slot holding the message of the most recent job failure
    pub fn last_error(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.last_error)
    }

    /// Start a new job, cancelling whatever ran before
    ///
    /// Returns the job snapshot as installed in the session.
    pub async fn start_job(self: &Arc<Self>, submission: MediaSubmission) -> AnalysisJob {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            let previous_id = previous.job_id;
            previous.stop();
            // A finished job is simply replaced
            if self.session.read().await.accepts_job(previous_id) {
                info!(job_id = %previous_id, "Cancelled previous job");
                self.event_bus.emit_lossy(FormcheckEvent::JobCancelled {
                    job_id: previous_id,
                    timestamp: Utc::now(),
                });
            }
        }

        let MediaSubmission {
            filename,
            muscle_group,
            exercise_name,
            mode,
            payload,
        } = submission;

        let size_bytes = payload.len() as u64;
        let mode = mode.resolve(size_bytes, self.config.inline_max_bytes);
        let muscle_group = muscle_group
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.config.default_muscle_group.clone());

        let job = AnalysisJob::new(
            mode,
            JobSubmission {
                filename: filename.clone(),
                size_bytes,
                muscle_group,
                exercise_name: exercise_name.unwrap_or_default(),
            },
        );
        let job_id = job.id;

        {
            let mut session = self.session.write().await;
            let job = job.clone();
            transition(&mut session, |s| s.start_job(job));
        }

        info!(job_id = %job_id, mode = ?mode, filename = %filename, size_bytes, "Analysis job started");
        self.event_bus.emit_lossy(FormcheckEvent::JobStarted {
            job_id,
            mode,
            filename,
            size_bytes,
            timestamp: Utc::now(),
        });

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let orchestrator = Arc::clone(self);
        let submission = job.submission.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run_job(job_id, task_cancel, mode, submission, payload).await;
        });

        *active = Some(ActiveJob {
            job_id,
            cancel,
            handle,
        });

        job
    }

    /// Snapshot of the current job
    pub async fn current_job(&self) -> Option<AnalysisJob> {
        self.session.read().await.job.clone()
    }

    /// Cancel the live job and return the session to idle
    ///
    /// Returns the cancelled job id, or `None` when no job was live.
    pub async fn cancel_current(&self) -> Option<Uuid> {
        let mut active = self.active.lock().await;
        let job_id = {
            let session = self.session.read().await;
            session.job.as_ref().filter(|j| j.state.is_live()).map(|j| j.id)
        }?;

        if let Some(running) = active.take() {
            running.stop();
        }
        self.discard(job_id).await;
        Some(job_id)
    }

    /// Stop any running job (view teardown / server shutdown)
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(running) = active.take() {
            let job_id = running.job_id;
            running.stop();
            let live = self.session.read().await.accepts_job(job_id);
            if live {
                self.discard(job_id).await;
            }
        }
        debug!("Job orchestrator shut down");
    }

    async fn discard(&self, job_id: Uuid) {
        {
            let mut session = self.session.write().await;
            if session.job.as_ref().map(|j| j.id) == Some(job_id) {
                transition(&mut session, Session::discard_job);
            }
        }
        info!(job_id = %job_id, "Analysis job cancelled");
        self.event_bus.emit_lossy(FormcheckEvent::JobCancelled {
            job_id,
            timestamp: Utc::now(),
        });
    }

    async fn run_job(
        self: Arc<Self>,
        job_id: Uuid,
        cancel: CancellationToken,
        mode: SubmitMode,
        submission: JobSubmission,
        payload: Vec<u8>,
    ) {
        let outcome = match mode {
            SubmitMode::Inline => self.run_inline(job_id, &cancel, &submission, payload).await,
            _ => self.run_upload(job_id, &cancel, &submission, payload).await,
        };

        match outcome {
            Ok(result) => {
                self.apply(job_id, &cancel, JobUpdate::Completed(result)).await;
            }
            Err(JobError::Failed { reason, detail }) => {
                self.apply(job_id, &cancel, JobUpdate::Failed { reason, detail }).await;
            }
            Err(JobError::Cancelled) => {
                debug!(job_id = %job_id, "Job task stopped");
            }
        }
    }

    async fn run_upload(
        &self,
        job_id: Uuid,
        cancel: &CancellationToken,
        submission: &JobSubmission,
        payload: Vec<u8>,
    ) -> Result<AnalysisResult, JobError> {
        let target = guarded(
            cancel,
            FailureReason::UploadTargetUnavailable,
            self.api.request_upload_target(UploadTargetRequest {
                filename: &submission.filename,
                size_bytes: submission.size_bytes,
                user_id: &self.config.user_id,
            }),
        )
        .await?;

        self.advance(
            job_id,
            cancel,
            JobUpdate::Progress {
                state: JobState::Uploading,
                text: String::from("Uploading video..."),
                percentage: 30,
                video_id: Some(target.video_id.clone()),
                upload_target: Some(target.upload_url.clone()),
            },
        )
        .await?;

        guarded(
            cancel,
            FailureReason::TransferFailed,
            self.api.transfer_media(&target.upload_url, payload),
        )
        .await?;

        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::TriggeringProcessing, "Triggering video processing...", 60),
        )
        .await?;

        guarded(
            cancel,
            FailureReason::TriggerRejected,
            self.api.trigger_processing(&target.video_id, &submission.muscle_group),
        )
        .await?;

        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::Polling, "Waiting for processing...", 75),
        )
        .await?;

        self.poll_until_terminal(job_id, cancel, &target.video_id).await?;

        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::Polling, "Fetching results...", 90),
        )
        .await?;

        guarded(
            cancel,
            FailureReason::ResultFetchFailed,
            self.api.fetch_result(&target.video_id),
        )
        .await
    }

    /// Poll until the analyzer reports `done`
    ///
    /// Sleeps before every poll. Consecutive transport failures back off and
    /// are bounded by the retry policy; the optional deadline bounds the
    /// whole loop.
    async fn poll_until_terminal(
        &self,
        job_id: Uuid,
        cancel: &CancellationToken,
        video_id: &str,
    ) -> Result<(), JobError> {
        let polling = &self.config.polling;
        let policy = RetryPolicy::new(polling.max_retries, polling.interval, polling.max_backoff);
        let deadline = polling.timeout.map(|t| Instant::now() + t);
        let mut failures = 0u32;
        let mut attempt = 0u32;

        loop {
            let wait = policy.backoff(failures).unwrap_or(polling.max_backoff);
            tokio::select! {
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(JobError::failed(
                        FailureReason::PollTimeout,
                        format!("no terminal status after {} polls", attempt),
                    ));
                }
            }

            attempt += 1;
            let polled = tokio::select! {
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                polled = self.api.poll_status(video_id) => polled,
            };

            match polled {
                Ok(status) => {
                    failures = 0;
                    debug!(job_id = %job_id, attempt, status = status.as_str(), "Poll status");
                    self.advance(
                        job_id,
                        cancel,
                        JobUpdate::progress(JobState::Polling, format!("Processing: {}", status.as_str()), 75),
                    )
                    .await?;

                    match status {
                        RemoteStatus::Done => return Ok(()),
                        RemoteStatus::Failed => {
                            return Err(JobError::failed(
                                FailureReason::ProcessingFailed,
                                "analyzer reported status=failed",
                            ))
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    failures += 1;
                    if policy.backoff(failures).is_none() {
                        return Err(JobError::failed(
                            FailureReason::PollTransportError,
                            format!("{} consecutive poll failures, last: {}", failures, e),
                        ));
                    }
                    warn!(job_id = %job_id, attempt, failures, error = %e, "Poll failed, retrying");
                }
            }
        }
    }

    async fn run_inline(
        &self,
        job_id: Uuid,
        cancel: &CancellationToken,
        submission: &JobSubmission,
        payload: Vec<u8>,
    ) -> Result<AnalysisResult, JobError> {
        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::Submitting, "Encoding video...", 30),
        )
        .await?;

        let video_id = job_id.simple().to_string();
        let request = InlineAnalyzeRequest::new(
            &video_id,
            &submission.muscle_group,
            &submission.exercise_name,
            &payload,
        );
        drop(payload);

        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::Submitting, "Sending to AI for analysis...", 60),
        )
        .await?;

        let result = guarded(cancel, FailureReason::SubmitFailed, self.api.analyze_inline(request)).await?;

        self.advance(
            job_id,
            cancel,
            JobUpdate::progress(JobState::Submitting, "Reading analysis...", 90),
        )
        .await?;

        Ok(result)
    }

    /// Apply a progress update; a dropped update means the job is gone
    async fn advance(&self, job_id: Uuid, cancel: &CancellationToken, update: JobUpdate) -> Result<(), JobError> {
        if self.apply(job_id, cancel, update).await {
            Ok(())
        } else {
            Err(JobError::Cancelled)
        }
    }

    /// Guarded write of a job update into the session
    ///
    /// Returns `false` when the update was dropped.
    async fn apply(&self, job_id: Uuid, cancel: &CancellationToken, update: JobUpdate) -> bool {
        let event = {
            let mut session = self.session.write().await;
            if cancel.is_cancelled() || !session.accepts_job(job_id) {
                debug!(job_id = %job_id, "Dropping update for stale job");
                return false;
            }

            let (next, applied) = std::mem::take(&mut *session).apply_job_update(job_id, update);
            *session = next;
            let Some(applied) = applied else {
                return false;
            };
            let Some(job) = session.job.as_ref() else {
                return false;
            };
            let mut failure_message = None;

            let event = match applied.new_state {
                JobState::Done => {
                    let result = session.result.as_ref();
                    let form_score = result.map(|r| r.clamped_score()).unwrap_or_default();
                    let event_count = result.map(|r| r.events.len()).unwrap_or_default();
                    info!(job_id = %job_id, form_score, event_count, "Analysis job completed");
                    FormcheckEvent::JobCompleted {
                        job_id,
                        form_score,
                        event_count,
                        duration_seconds: job.elapsed_seconds(),
                        timestamp: applied.transitioned_at,
                    }
                }
                JobState::Failed => {
                    let (reason, detail) = job
                        .failure
                        .as_ref()
                        .map(|f| (f.reason, f.detail.as_str()))
                        .unwrap_or((FailureReason::ProcessingFailed, ""));
                    error!(job_id = %job_id, reason = %reason, detail, "Analysis job failed");
                    failure_message = Some(if detail.is_empty() {
                        reason.status_message().to_string()
                    } else {
                        format!("{} ({})", reason.status_message(), detail)
                    });
                    FormcheckEvent::JobFailed {
                        job_id,
                        reason,
                        message: reason.status_message().to_string(),
                        timestamp: applied.transitioned_at,
                    }
                }
                _ => {
                    if applied.old_state != applied.new_state {
                        debug!(
                            job_id = %job_id,
                            old_state = %applied.old_state,
                            new_state = %applied.new_state,
                            "Job state changed"
                        );
                    }
                    FormcheckEvent::JobProgress {
                        job_id,
                        old_state: applied.old_state,
                        new_state: applied.new_state,
                        progress_text: job.progress.text.clone(),
                        percentage: job.progress.percentage,
                        timestamp: applied.transitioned_at,
                    }
                }
            };

            // Recorded before the session lock is released
            if let Some(message) = failure_message {
                *self.last_error.write().await = Some(message);
            }
            event
        };

        self.event_bus.emit_lossy(event);
        true
    }
}

/// Await an analyzer call unless the job is cancelled first
async fn guarded<T, F>(cancel: &CancellationToken, reason: FailureReason, call: F) -> Result<T, JobError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        outcome = call => outcome.map_err(|e| JobError::failed(reason, e.to_string())),
    }
}
