//! Services for formcheck-ai

pub mod analyzer_client;
pub mod job_orchestrator;

pub use analyzer_client::{AnalyzerApi, ClientError, HttpAnalyzerClient, RemoteStatus, UploadTarget};
pub use job_orchestrator::{JobOrchestrator, MediaSubmission, OrchestratorConfig, PollingConfig};
