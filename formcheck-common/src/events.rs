//! Event types for the formcheck event system
//!
//! Provides the shared event enum and an EventBus over a tokio broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::job::{FailureReason, JobState, SubmitMode};

/// formcheck event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FormcheckEvent {
    /// A new analysis job was started (any previous job was discarded)
    JobStarted {
        job_id: Uuid,
        mode: SubmitMode,
        filename: String,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// Job moved between states or reported new progress text
    JobProgress {
        job_id: Uuid,
        old_state: JobState,
        new_state: JobState,
        progress_text: String,
        percentage: u8,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `Done`
    JobCompleted {
        job_id: Uuid,
        form_score: f64,
        event_count: usize,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `Failed`
    JobFailed {
        job_id: Uuid,
        reason: FailureReason,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Job was cancelled by a newer job or by teardown
    JobCancelled {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Overlay visibility toggled
    OverlayToggled {
        show_overlay: bool,
        timestamp: DateTime<Utc>,
    },

    /// User jumped to a feedback event
    IssueSelected {
        index: usize,
        seek_to: f64,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// The core asks the player to seek
    SeekRequested {
        position: f64,
        timestamp: DateTime<Utc>,
    },

    /// The core asks the player to play or pause
    PlaybackToggleRequested {
        play: bool,
        timestamp: DateTime<Utc>,
    },
}

impl FormcheckEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            FormcheckEvent::JobStarted { .. } => "JobStarted",
            FormcheckEvent::JobProgress { .. } => "JobProgress",
            FormcheckEvent::JobCompleted { .. } => "JobCompleted",
            FormcheckEvent::JobFailed { .. } => "JobFailed",
            FormcheckEvent::JobCancelled { .. } => "JobCancelled",
            FormcheckEvent::OverlayToggled { .. } => "OverlayToggled",
            FormcheckEvent::IssueSelected { .. } => "IssueSelected",
            FormcheckEvent::SeekRequested { .. } => "SeekRequested",
            FormcheckEvent::PlaybackToggleRequested { .. } => "PlaybackToggleRequested",
        }
    }

    /// Job this event belongs to, if any
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            FormcheckEvent::JobStarted { job_id, .. }
            | FormcheckEvent::JobProgress { job_id, .. }
            | FormcheckEvent::JobCompleted { job_id, .. }
            | FormcheckEvent::JobFailed { job_id, .. }
            | FormcheckEvent::JobCancelled { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}

/// Broadcast bus for FormcheckEvent
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FormcheckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use formcheck_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FormcheckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FormcheckEvent,
    ) -> Result<usize, broadcast::error::SendError<FormcheckEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FormcheckEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
