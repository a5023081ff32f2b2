//! Remote AI analyzer client
//!
//! `AnalyzerApi` is the seam the orchestrator drives; `HttpAnalyzerClient`
//! talks to the analyzer's HTTP API:
//!
//! | Call | Endpoint |
//! |---|---|
//! | upload target | `POST /api/video/upload-url` |
//! | transfer | `PUT <upload_url>` |
//! | trigger | `POST /api/video/process` |
//! | status | `GET /api/video/status?job_id=` |
//! | result | `GET /api/video/result?video_id=` |
//! | inline analyze | `POST /api/video/analyze` |

use async_trait::async_trait;
use base64::Engine;
use formcheck_common::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("formcheck-ai/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Analyzer client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid upload target: {0}")]
    InvalidUploadTarget(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

/// Upload destination granted by the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub upload_url: String,
    pub video_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadTargetRequest<'a> {
    pub filename: &'a str,
    pub size_bytes: u64,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ProcessRequest<'a> {
    video_id: &'a str,
    muscle_group: &'a str,
}

/// Inline analyze request; `video_base64` carries the whole payload
#[derive(Debug, Clone, Serialize)]
pub struct InlineAnalyzeRequest<'a> {
    pub video_id: &'a str,
    pub muscle_group: &'a str,
    pub exercise_name: &'a str,
    pub video_base64: String,
}

impl<'a> InlineAnalyzeRequest<'a> {
    pub fn new(video_id: &'a str, muscle_group: &'a str, exercise_name: &'a str, payload: &[u8]) -> Self {
        Self {
            video_id,
            muscle_group,
            exercise_name,
            video_base64: base64::engine::general_purpose::STANDARD.encode(payload),
        }
    }
}

/// Processing status reported by the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Processing,
    Done,
    Failed,
    /// Anything else; polling continues
    Other(String),
}

impl RemoteStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => RemoteStatus::Queued,
            "processing" => RemoteStatus::Processing,
            "done" => RemoteStatus::Done,
            "failed" => RemoteStatus::Failed,
            _ => RemoteStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::Queued => "queued",
            RemoteStatus::Processing => "processing",
            RemoteStatus::Done => "done",
            RemoteStatus::Failed => "failed",
            RemoteStatus::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Done | RemoteStatus::Failed)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
}

/// Operations the orchestrator needs from the analyzer
#[async_trait]
pub trait AnalyzerApi: Send + Sync {
    async fn request_upload_target(&self, request: UploadTargetRequest<'_>) -> Result<UploadTarget, ClientError>;

    async fn transfer_media(&self, upload_url: &str, payload: Vec<u8>) -> Result<(), ClientError>;

    async fn trigger_processing(&self, video_id: &str, muscle_group: &str) -> Result<(), ClientError>;

    async fn poll_status(&self, job_id: &str) -> Result<RemoteStatus, ClientError>;

    async fn fetch_result(&self, video_id: &str) -> Result<AnalysisResult, ClientError>;

    async fn analyze_inline(&self, request: InlineAnalyzeRequest<'_>) -> Result<AnalysisResult, ClientError>;
}

/// Pull an `AnalysisResult` out of a result document
///
/// The analysis may sit at the top level or under `summary` / `llm_feedback`;
/// the overlay video URL sits under `visual_overlays.frame_overlays_url`.
pub fn extract_result(document: serde_json::Value) -> Result<AnalysisResult, ClientError> {
    let overlays_url = document
        .pointer("/visual_overlays/frame_overlays_url")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let body = ["summary", "llm_feedback"]
        .iter()
        .find_map(|key| document.get(*key).filter(|v| v.is_object()).cloned())
        .unwrap_or(document);

    let mut result: AnalysisResult =
        serde_json::from_value(body).map_err(|e| ClientError::Parse(e.to_string()))?;
    if result.visual_overlays_url.is_none() {
        result.visual_overlays_url = overlays_url;
    }
    Ok(result)
}

/// reqwest-backed analyzer client
pub struct HttpAnalyzerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAnalyzerClient {
    /// `base_url` without a trailing slash, e.g. `http://127.0.0.1:8000`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status(status.as_u16(), body))
    }
}

#[async_trait]
impl AnalyzerApi for HttpAnalyzerClient {
    async fn request_upload_target(&self, request: UploadTargetRequest<'_>) -> Result<UploadTarget, ClientError> {
        tracing::debug!(filename = request.filename, size_bytes = request.size_bytes, "Requesting upload target");

        let response = self
            .http_client
            .post(self.url("/api/video/upload-url"))
            .json(&request)
            .send()
            .await?;
        let target: UploadTarget = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        reqwest::Url::parse(&target.upload_url)
            .map_err(|e| ClientError::InvalidUploadTarget(format!("{}: {}", target.upload_url, e)))?;
        if target.video_id.trim().is_empty() {
            return Err(ClientError::InvalidUploadTarget("empty video_id".to_string()));
        }
        Ok(target)
    }

    async fn transfer_media(&self, upload_url: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        tracing::debug!(bytes = payload.len(), "Transferring media");
        let response = self.http_client.put(upload_url).body(payload).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn trigger_processing(&self, video_id: &str, muscle_group: &str) -> Result<(), ClientError> {
        let response = self
            .http_client
            .post(self.url("/api/video/process"))
            .json(&ProcessRequest { video_id, muscle_group })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn poll_status(&self, job_id: &str) -> Result<RemoteStatus, ClientError> {
        let response = self
            .http_client
            .get(self.url("/api/video/status"))
            .query(&[("job_id", job_id)])
            .send()
            .await?;
        let status: StatusResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(RemoteStatus::parse(&status.status))
    }

    async fn fetch_result(&self, video_id: &str) -> Result<AnalysisResult, ClientError> {
        let response = self
            .http_client
            .get(self.url("/api/video/result"))
            .query(&[("video_id", video_id)])
            .send()
            .await?;
        let document: serde_json::Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        extract_result(document)
    }

    async fn analyze_inline(&self, request: InlineAnalyzeRequest<'_>) -> Result<AnalysisResult, ClientError> {
        tracing::debug!(
            video_id = request.video_id,
            encoded_bytes = request.video_base64.len(),
            "Submitting inline analysis"
        );
        let response = self
            .http_client
            .post(self.url("/api/video/analyze"))
            .json(&request)
            .send()
            .await?;
        let document: serde_json::Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        extract_result(document)
    }
}
