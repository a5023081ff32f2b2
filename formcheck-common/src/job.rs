//! Analysis job states and failure taxonomy
//!
//! Upload path:
//! IDLE → REQUESTING_UPLOAD_TARGET → UPLOADING → TRIGGERING_PROCESSING → POLLING → DONE | FAILED
//!
//! Inline path (small payloads):
//! IDLE → SUBMITTING → DONE | FAILED

use serde::{Deserialize, Serialize};
use std::fmt;

/// Analysis job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// No job
    Idle,
    /// Asking the analyzer for an upload destination
    RequestingUploadTarget,
    /// Transferring raw media to the upload destination
    Uploading,
    /// Asking the analyzer to start processing the uploaded media
    TriggeringProcessing,
    /// Waiting for the analyzer to report `done` or `failed`
    Polling,
    /// Inline submission in flight
    Submitting,
    /// Result available
    Done,
    /// Job failed; see the failure reason
    Failed,
}

impl JobState {
    /// Terminal states see no further automatic transition
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// A live job holds network resources (requests or a poll loop)
    pub fn is_live(self) -> bool {
        !self.is_terminal() && self != JobState::Idle
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "IDLE",
            JobState::RequestingUploadTarget => "REQUESTING_UPLOAD_TARGET",
            JobState::Uploading => "UPLOADING",
            JobState::TriggeringProcessing => "TRIGGERING_PROCESSING",
            JobState::Polling => "POLLING",
            JobState::Submitting => "SUBMITTING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// How media reaches the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Inline for small payloads, upload otherwise
    #[default]
    Auto,
    /// Upload target → transfer → trigger → poll
    Upload,
    /// Single synchronous analyze request carrying the media
    Inline,
}

impl SubmitMode {
    /// Resolve `Auto` against the payload size
    pub fn resolve(self, size_bytes: u64, inline_max_bytes: u64) -> SubmitMode {
        match self {
            SubmitMode::Auto if size_bytes <= inline_max_bytes => SubmitMode::Inline,
            SubmitMode::Auto => SubmitMode::Upload,
            other => other,
        }
    }
}

/// Why a job ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    UploadTargetUnavailable,
    TransferFailed,
    TriggerRejected,
    /// Transient poll errors exceeded the retry bound
    PollTransportError,
    /// Polling exceeded its deadline without a terminal status
    PollTimeout,
    ResultFetchFailed,
    /// Analyzer reported `failed`
    ProcessingFailed,
    /// Inline analyze request failed
    SubmitFailed,
}

impl FailureReason {
    /// User-facing status line
    pub fn status_message(self) -> &'static str {
        match self {
            FailureReason::UploadTargetUnavailable => "Could not get an upload URL.",
            FailureReason::TransferFailed => "Video upload failed.",
            FailureReason::TriggerRejected => "Analyzer refused to process the video.",
            FailureReason::PollTransportError => "Lost contact with the analyzer.",
            FailureReason::PollTimeout => "Processing timed out.",
            FailureReason::ResultFetchFailed => "Could not download the analysis result.",
            FailureReason::ProcessingFailed => "Processing failed.",
            FailureReason::SubmitFailed => "Analysis failed.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
