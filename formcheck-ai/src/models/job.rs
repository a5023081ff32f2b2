//! Analysis job record
//!
//! Serializable snapshot of the one job a session may own. The task driving
//! the job (cancellation token and join handle) lives in the orchestrator.

use chrono::{DateTime, Utc};
use formcheck_common::{FailureReason, JobState, SubmitMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// User-visible progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Status line shown to the user
    pub text: String,
    /// 0-100
    pub percentage: u8,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            text: String::from("Starting..."),
            percentage: 0,
        }
    }
}

/// Why the job failed, with transport detail for logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub reason: FailureReason,
    pub detail: String,
}

/// What the caller submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmission {
    pub filename: String,
    pub size_bytes: u64,
    pub muscle_group: String,
    pub exercise_name: String,
}

/// One analysis job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub state: JobState,
    /// Resolved mode (never `Auto`)
    pub mode: SubmitMode,
    /// Analyzer-side video id once known
    pub video_id: Option<String>,
    /// Upload destination once granted
    pub upload_target: Option<String>,
    pub progress: JobProgress,
    pub failure: Option<JobFailure>,
    pub submission: JobSubmission,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    /// New job in its first working state for `mode`
    pub fn new(mode: SubmitMode, submission: JobSubmission) -> Self {
        let state = match mode {
            SubmitMode::Inline => JobState::Submitting,
            _ => JobState::RequestingUploadTarget,
        };
        let progress = match state {
            JobState::Submitting => JobProgress {
                text: String::from("Preparing video..."),
                percentage: 0,
            },
            _ => JobProgress {
                text: String::from("Getting upload URL..."),
                percentage: 10,
            },
        };

        Self {
            id: Uuid::new_v4(),
            state,
            mode,
            video_id: None,
            upload_target: None,
            progress,
            failure: None,
            submission,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`, stamping `ended_at` on terminal states
    pub fn transition_to(&mut self, new_state: JobState) -> StateTransition {
        let transition = StateTransition {
            job_id: self.id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        transition
    }

    pub fn update_progress(&mut self, text: impl Into<String>, percentage: u8) {
        self.progress.text = text.into();
        self.progress.percentage = percentage.min(100);
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Seconds since start, or total runtime once ended
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> JobSubmission {
        JobSubmission {
            filename: "squat.mp4".to_string(),
            size_bytes: 1024,
            muscle_group: "Legs".to_string(),
            exercise_name: "Squat".to_string(),
        }
    }

    #[test]
    fn test_initial_state_follows_mode() {
        assert_eq!(
            AnalysisJob::new(SubmitMode::Upload, submission()).state,
            JobState::RequestingUploadTarget
        );
        assert_eq!(
            AnalysisJob::new(SubmitMode::Inline, submission()).state,
            JobState::Submitting
        );
    }

    #[test]
    fn test_terminal_transition_sets_end_time() {
        let mut job = AnalysisJob::new(SubmitMode::Upload, submission());
        let t = job.transition_to(JobState::Uploading);
        assert_eq!(t.old_state, JobState::RequestingUploadTarget);
        assert!(job.ended_at.is_none());

        job.transition_to(JobState::Failed);
        assert!(job.is_terminal());
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_percentage_is_capped() {
        let mut job = AnalysisJob::new(SubmitMode::Upload, submission());
        job.update_progress("Processing: queued", 250);
        assert_eq!(job.progress.percentage, 100);
        assert_eq!(job.progress.text, "Processing: queued");
    }
}
