//! Shared test helpers: a scripted analyzer and session polling utilities

#![allow(dead_code)]

use async_trait::async_trait;
use formcheck_ai::services::analyzer_client::{
    AnalyzerApi, ClientError, InlineAnalyzeRequest, RemoteStatus, UploadTarget, UploadTargetRequest,
};
use formcheck_ai::services::{JobOrchestrator, MediaSubmission, OrchestratorConfig, PollingConfig};
use formcheck_ai::session::Session;
use formcheck_common::events::EventBus;
use formcheck_common::{AnalysisResult, FeedbackEvent, JobState, Severity, SubmitMode};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// One scripted poll response
#[derive(Debug, Clone)]
pub enum PollStep {
    Status(&'static str),
    TransportError,
}

/// Which call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    UploadTarget,
    Transfer,
    Trigger,
    FetchResult,
    Inline,
}

/// Analyzer double driven by a script
///
/// Upload targets hand out `video-1`, `video-2`, ... Poll responses are
/// scripted per video id; an exhausted script keeps answering `processing`.
pub struct ScriptedAnalyzer {
    fail_at: Option<FailAt>,
    result: AnalysisResult,
    polls: Mutex<HashMap<String, VecDeque<PollStep>>>,
    next_video: Mutex<u32>,
    calls: Mutex<Vec<String>>,
    inline_payloads: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new(result: AnalysisResult) -> Self {
        Self {
            fail_at: None,
            result,
            polls: Mutex::new(HashMap::new()),
            next_video: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
            inline_payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }

    pub fn with_polls(self, video_id: &str, steps: Vec<PollStep>) -> Self {
        self.polls
            .lock()
            .unwrap()
            .insert(video_id.to_string(), steps.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn poll_count(&self, video_id: &str) -> usize {
        let needle = format!("poll:{}", video_id);
        self.calls().iter().filter(|c| **c == needle).count()
    }

    pub fn inline_payloads(&self) -> Vec<String> {
        self.inline_payloads.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail(&self, at: FailAt) -> Result<(), ClientError> {
        if self.fail_at == Some(at) {
            Err(ClientError::Status(500, format!("{:?} scripted failure", at)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AnalyzerApi for ScriptedAnalyzer {
    async fn request_upload_target(&self, request: UploadTargetRequest<'_>) -> Result<UploadTarget, ClientError> {
        self.record(format!("upload-url:{}", request.filename));
        self.fail(FailAt::UploadTarget)?;
        let video_id = {
            let mut next = self.next_video.lock().unwrap();
            *next += 1;
            format!("video-{}", *next)
        };
        Ok(UploadTarget {
            upload_url: format!("https://storage.test/{}", video_id),
            video_id,
        })
    }

    async fn transfer_media(&self, upload_url: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        self.record(format!("put:{}:{}", upload_url, payload.len()));
        self.fail(FailAt::Transfer)
    }

    async fn trigger_processing(&self, video_id: &str, muscle_group: &str) -> Result<(), ClientError> {
        self.record(format!("process:{}:{}", video_id, muscle_group));
        self.fail(FailAt::Trigger)
    }

    async fn poll_status(&self, job_id: &str) -> Result<RemoteStatus, ClientError> {
        self.record(format!("poll:{}", job_id));
        let step = self
            .polls
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(PollStep::Status("processing"));
        match step {
            PollStep::Status(status) => Ok(RemoteStatus::parse(status)),
            PollStep::TransportError => Err(ClientError::Network("connection reset".to_string())),
        }
    }

    async fn fetch_result(&self, video_id: &str) -> Result<AnalysisResult, ClientError> {
        self.record(format!("result:{}", video_id));
        self.fail(FailAt::FetchResult)?;
        Ok(self.result.clone())
    }

    async fn analyze_inline(&self, request: InlineAnalyzeRequest<'_>) -> Result<AnalysisResult, ClientError> {
        self.record(format!("analyze:{}:{}", request.muscle_group, request.exercise_name));
        self.inline_payloads.lock().unwrap().push(request.video_base64.clone());
        self.fail(FailAt::Inline)?;
        Ok(self.result.clone())
    }
}

/// Analysis with three events of mixed severity
pub fn sample_result() -> AnalysisResult {
    AnalysisResult {
        form_score: 7.5,
        confidence: 85.0,
        rep_count: Some(8),
        events: vec![
            FeedbackEvent {
                body_part: "Knees".to_string(),
                issue: "Caving inward on the ascent".to_string(),
                correction: "Drive knees out over toes".to_string(),
                severity: Severity::High,
                confidence: Some(90.0),
                time_expression: Some("00:10-00:20".to_string()),
            },
            FeedbackEvent {
                body_part: "Lower back".to_string(),
                issue: "Rounding at the bottom".to_string(),
                correction: "Brace before descending".to_string(),
                severity: Severity::Critical,
                confidence: Some(80.0),
                time_expression: Some("01:05".to_string()),
            },
            FeedbackEvent {
                body_part: "Head".to_string(),
                issue: "Looking up".to_string(),
                correction: "Keep a neutral neck".to_string(),
                severity: Severity::Low,
                confidence: None,
                time_expression: Some("throughout video".to_string()),
            },
        ],
        visual_overlays_url: None,
    }
}

/// Fast polling for tests
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        polling: PollingConfig {
            interval: Duration::from_millis(10),
            max_retries: 3,
            max_backoff: Duration::from_millis(40),
            timeout: Some(Duration::from_secs(5)),
        },
        inline_max_bytes: 64,
        user_id: "tester".to_string(),
        default_muscle_group: "Legs".to_string(),
    }
}

pub struct Harness {
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub session: Arc<RwLock<Session>>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub event_bus: EventBus,
}

pub fn harness(analyzer: ScriptedAnalyzer, config: OrchestratorConfig) -> Harness {
    let analyzer = Arc::new(analyzer);
    let session = Arc::new(RwLock::new(Session::default()));
    let event_bus = EventBus::new(256);
    let orchestrator = Arc::new(JobOrchestrator::new(
        analyzer.clone(),
        Arc::clone(&session),
        event_bus.clone(),
        config,
    ));
    Harness {
        analyzer,
        session,
        orchestrator,
        event_bus,
    }
}

pub fn submission(mode: SubmitMode, size: usize) -> MediaSubmission {
    MediaSubmission {
        filename: "squat.mp4".to_string(),
        muscle_group: None,
        exercise_name: Some("Back Squat".to_string()),
        mode,
        payload: vec![7u8; size],
    }
}

/// Wait until the session's job reaches `state`
pub async fn wait_for_state(session: &Arc<RwLock<Session>>, state: JobState) -> Session {
    wait_until(session, |s| s.job.as_ref().map(|j| j.state) == Some(state)).await
}

/// Wait until the current job is terminal
pub async fn wait_for_terminal(session: &Arc<RwLock<Session>>) -> Session {
    wait_until(session, |s| s.job.as_ref().map(|j| j.is_terminal()).unwrap_or(false)).await
}

pub async fn wait_until<F>(session: &Arc<RwLock<Session>>, predicate: F) -> Session
where
    F: Fn(&Session) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        {
            let current = session.read().await;
            if predicate(&current) {
                return current.clone();
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for session condition"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
