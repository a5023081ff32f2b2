//! # formcheck Common Library
//!
//! Shared code for the formcheck services including:
//! - Analysis result model (feedback events, severities)
//! - Job state and failure taxonomy
//! - Event types (FormcheckEvent enum) and the EventBus
//! - Configuration loading

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod job;

pub use analysis::{AnalysisResult, FeedbackEvent, Severity};
pub use error::{Error, Result};
pub use job::{FailureReason, JobState, SubmitMode};
