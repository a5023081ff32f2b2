//! Session state
//!
//! One explicit value holding everything the overlay and the UI read: the
//! current job, the current result, the overlay flag and the manual
//! selection. Each transition consumes the session and returns the next one.
//! Writers hold the `RwLock` write guard for the whole transition.

use chrono::{DateTime, Utc};
use formcheck_common::events::{EventBus, FormcheckEvent};
use formcheck_common::{AnalysisResult, FailureReason, JobState, Severity, SubmitMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AnalysisJob, JobFailure, StateTransition};
use crate::overlay::activation::SelectionOverride;
use crate::overlay::scheduler::{render_tick, OverlayConfig, RenderDescription, RenderInput, Viewport};
use crate::overlay::text::TextMeasure;
use crate::overlay::timestamp::{self, TimestampError};
use crate::player::{MediaPlayer, PlaybackCursor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No analysis available")]
    NoAnalysis,

    #[error("Issue index {index} out of range ({count} issues)")]
    IssueOutOfRange { index: usize, count: usize },

    #[error("Issue {index} has no usable timestamp ({expression:?})")]
    UnjumpableTimestamp { index: usize, expression: String },
}

/// Update produced by the job task
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Progress {
        state: JobState,
        text: String,
        percentage: u8,
        video_id: Option<String>,
        upload_target: Option<String>,
    },
    Completed(AnalysisResult),
    Failed { reason: FailureReason, detail: String },
}

impl JobUpdate {
    pub fn progress(state: JobState, text: impl Into<String>, percentage: u8) -> Self {
        JobUpdate::Progress {
            state,
            text: text.into(),
            percentage,
            video_id: None,
            upload_target: None,
        }
    }
}

/// Where a jump lands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpTarget {
    pub index: usize,
    /// Seek position in seconds
    pub seek_to: f64,
    /// End of the event's jump window
    pub dwell_until: f64,
    /// When the manual selection stops overriding playback
    pub expires_at: DateTime<Utc>,
}

/// Issue line in an exported analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedIssue {
    pub body_part: String,
    pub issue: String,
    pub correction: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Downloadable analysis document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisExport {
    pub exercise: String,
    pub muscle_group: String,
    pub score: f64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_count: Option<u32>,
    pub issues: Vec<ExportedIssue>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisExport {
    /// `form-analysis-<millis>.json`
    pub fn filename(&self) -> String {
        format!("form-analysis-{}.json", self.timestamp.timestamp_millis())
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub job: Option<AnalysisJob>,
    pub result: Option<Arc<AnalysisResult>>,
    pub show_overlay: bool,
    pub selection: Option<SelectionOverride>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            job: None,
            result: None,
            show_overlay: true,
            selection: None,
        }
    }
}

impl Session {
    /// Install a new job, dropping the previous result and selection
    pub fn start_job(self, job: AnalysisJob) -> Self {
        Self {
            job: Some(job),
            result: None,
            selection: None,
            ..self
        }
    }

    /// Is `job_id` the job this session currently tracks, and still running?
    pub fn accepts_job(&self, job_id: Uuid) -> bool {
        self.job
            .as_ref()
            .map(|job| job.id == job_id && !job.is_terminal())
            .unwrap_or(false)
    }

    /// Apply a job-task update
    ///
    /// Updates for a job other than the current one, or for a job already in a
    /// terminal state, are dropped and yield no transition.
    pub fn apply_job_update(mut self, job_id: Uuid, update: JobUpdate) -> (Self, Option<StateTransition>) {
        if !self.accepts_job(job_id) {
            debug!(job_id = %job_id, "Dropping update for superseded job");
            return (self, None);
        }
        let Some(job) = self.job.as_mut() else {
            return (self, None);
        };

        let transition = match update {
            JobUpdate::Progress {
                state,
                text,
                percentage,
                video_id,
                upload_target,
            } => {
                if video_id.is_some() {
                    job.video_id = video_id;
                }
                if upload_target.is_some() {
                    job.upload_target = upload_target;
                }
                job.update_progress(text, percentage);
                job.transition_to(state)
            }
            JobUpdate::Completed(result) => {
                let text = match job.mode {
                    SubmitMode::Inline => "Analysis complete!",
                    _ => "Processing complete.",
                };
                job.update_progress(text, 100);
                let transition = job.transition_to(JobState::Done);
                self.result = Some(Arc::new(result));
                self.selection = None;
                transition
            }
            JobUpdate::Failed { reason, detail } => {
                job.update_progress(reason.status_message(), job.progress.percentage);
                job.failure = Some(JobFailure { reason, detail });
                job.transition_to(JobState::Failed)
            }
        };

        (self, Some(transition))
    }

    /// Forget the current job; the session returns to idle
    pub fn discard_job(self) -> Self {
        Self { job: None, ..self }
    }

    pub fn toggle_overlay(self) -> Self {
        Self {
            show_overlay: !self.show_overlay,
            ..self
        }
    }

    /// Drop an expired selection
    pub fn tick_clock(self, now: DateTime<Utc>) -> Self {
        Self {
            selection: self.selection.filter(|s| s.is_live(now)),
            ..self
        }
    }

    /// Resolve where a jump to event `index` lands
    ///
    /// Sentinel timestamps land at the start of the video. An unreadable
    /// timestamp has nowhere to land and is refused.
    pub fn plan_jump(
        &self,
        index: usize,
        duration: f64,
        now: DateTime<Utc>,
        config: &OverlayConfig,
    ) -> Result<JumpTarget, SessionError> {
        let result = self.result.as_ref().ok_or(SessionError::NoAnalysis)?;
        let event = result.events.get(index).ok_or(SessionError::IssueOutOfRange {
            index,
            count: result.events.len(),
        })?;

        let interval = timestamp::parse_strict(event.time_expression.as_deref(), duration).map_err(
            |TimestampError::Malformed(expression)| SessionError::UnjumpableTimestamp { index, expression },
        )?;
        let (seek_to, dwell_until) = interval.jump_window(config.jump_dwell_secs);
        let window = chrono::Duration::from_std(config.selection_override)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));

        Ok(JumpTarget {
            index,
            seek_to,
            dwell_until,
            expires_at: now + window,
        })
    }

    /// Record a manual selection for a planned jump
    pub fn select_issue(self, target: &JumpTarget) -> Self {
        Self {
            selection: Some(SelectionOverride {
                index: target.index,
                expires_at: target.expires_at,
            }),
            ..self
        }
    }

    /// A job is holding network resources
    pub fn has_live_job(&self) -> bool {
        self.job.as_ref().map(|j| j.state.is_live()).unwrap_or(false)
    }

    /// Export document for the current result
    pub fn export(&self, now: DateTime<Utc>) -> Result<AnalysisExport, SessionError> {
        let result = self.result.as_ref().ok_or(SessionError::NoAnalysis)?;
        let (exercise, muscle_group) = self
            .job
            .as_ref()
            .map(|j| (j.submission.exercise_name.clone(), j.submission.muscle_group.clone()))
            .unwrap_or_default();

        Ok(AnalysisExport {
            exercise,
            muscle_group,
            score: result.clamped_score(),
            confidence: result.confidence,
            rep_count: result.rep_count,
            issues: result
                .events
                .iter()
                .map(|e| ExportedIssue {
                    body_part: e.body_part.clone(),
                    issue: e.issue.clone(),
                    correction: e.correction.clone(),
                    severity: e.severity,
                    timestamp: e.time_expression.clone(),
                })
                .collect(),
            timestamp: now,
        })
    }
}

/// Replace the locked session with `f(session)`
pub fn transition<F>(session: &mut Session, f: F)
where
    F: FnOnce(Session) -> Session,
{
    *session = f(std::mem::take(session));
}

/// Presentation-facing controls over the shared session
///
/// Toggle, jump and per-frame render. Job control lives in `JobOrchestrator`.
#[derive(Clone)]
pub struct SessionControls {
    session: Arc<RwLock<Session>>,
    player: Arc<dyn MediaPlayer>,
    event_bus: EventBus,
    config: Arc<OverlayConfig>,
}

impl SessionControls {
    pub fn new(
        session: Arc<RwLock<Session>>,
        player: Arc<dyn MediaPlayer>,
        event_bus: EventBus,
        config: OverlayConfig,
    ) -> Self {
        Self {
            session,
            player,
            event_bus,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Flip overlay visibility; returns the new value
    pub async fn toggle_overlay(&self) -> bool {
        let show_overlay = {
            let mut session = self.session.write().await;
            transition(&mut session, Session::toggle_overlay);
            session.show_overlay
        };

        info!(show_overlay, "Overlay toggled");
        self.event_bus.emit_lossy(FormcheckEvent::OverlayToggled {
            show_overlay,
            timestamp: Utc::now(),
        });
        show_overlay
    }

    /// Seek to event `index` and hold it as the caption for the override window
    pub async fn jump_to_issue(&self, index: usize) -> Result<JumpTarget, SessionError> {
        let now = Utc::now();
        let target = {
            let mut session = self.session.write().await;
            let target = session.plan_jump(index, self.player.duration(), now, &self.config)?;
            transition(&mut session, |s| s.select_issue(&target));
            target
        };

        self.player.seek(target.seek_to);
        info!(index, seek_to = target.seek_to, "Jumped to issue");
        self.event_bus.emit_lossy(FormcheckEvent::IssueSelected {
            index,
            seek_to: target.seek_to,
            expires_at: target.expires_at,
            timestamp: now,
        });
        Ok(target)
    }

    /// Play/pause; ignored while a job is live. Returns the new playing state.
    pub async fn toggle_playback(&self) -> Option<bool> {
        if self.session.read().await.has_live_job() {
            debug!("Ignoring playback toggle while a job is live");
            return None;
        }

        if self.player.is_paused() {
            self.player.play();
            Some(true)
        } else {
            self.player.pause();
            Some(false)
        }
    }

    /// Drop an expired selection
    pub async fn tick_clock(&self, now: DateTime<Utc>) {
        let mut session = self.session.write().await;
        transition(&mut session, |s| s.tick_clock(now));
    }

    /// Render one frame for `cursor` and `viewport`, defaulting to the player's
    pub async fn render_frame(
        &self,
        cursor: Option<PlaybackCursor>,
        viewport: Option<Viewport>,
        measure: &dyn TextMeasure,
    ) -> RenderDescription {
        let session = self.session.read().await;
        render_tick(&RenderInput {
            result: session.result.as_deref(),
            cursor: cursor.unwrap_or_else(|| self.player.cursor()),
            show_overlay: session.show_overlay,
            selection: session.selection,
            now: Utc::now(),
            viewport: viewport.unwrap_or_else(|| self.player.viewport()),
            config: &self.config,
            measure,
        })
    }
}
