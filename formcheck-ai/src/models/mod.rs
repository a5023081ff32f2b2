//! Data models for formcheck-ai

pub mod job;

pub use job::{AnalysisJob, JobFailure, JobProgress, JobSubmission, StateTransition};
