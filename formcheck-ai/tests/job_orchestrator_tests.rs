//! Job orchestrator integration tests
//!
//! Drives full jobs against the scripted analyzer: happy paths for both
//! submission modes, every failure reason, bounded poll retries, and
//! cancellation of superseded jobs.

mod helpers;

use formcheck_common::events::FormcheckEvent;
use formcheck_common::{FailureReason, JobState, SubmitMode};
use helpers::{
    fast_config, harness, sample_result, submission, wait_for_state, wait_for_terminal, FailAt, PollStep,
    ScriptedAnalyzer,
};
use std::time::Duration;

fn failure_reason(session: &formcheck_ai::session::Session) -> Option<FailureReason> {
    session.job.as_ref()?.failure.as_ref().map(|f| f.reason)
}

#[tokio::test]
async fn test_upload_path_reaches_done() {
    let analyzer = ScriptedAnalyzer::new(sample_result()).with_polls(
        "video-1",
        vec![PollStep::Status("queued"), PollStep::Status("processing"), PollStep::Status("done")],
    );
    let h = harness(analyzer, fast_config());

    let job = h.orchestrator.start_job(submission(SubmitMode::Upload, 1024)).await;
    assert_eq!(job.state, JobState::RequestingUploadTarget);
    assert_eq!(job.progress.text, "Getting upload URL...");

    let session = wait_for_terminal(&h.session).await;
    let finished = session.job.as_ref().unwrap();
    assert_eq!(finished.state, JobState::Done);
    assert_eq!(finished.video_id.as_deref(), Some("video-1"));
    assert_eq!(finished.upload_target.as_deref(), Some("https://storage.test/video-1"));
    assert_eq!(finished.progress.text, "Processing complete.");
    assert_eq!(finished.progress.percentage, 100);
    assert_eq!(session.result.as_deref(), Some(&sample_result()));

    let calls = h.analyzer.calls();
    assert_eq!(calls[0], "upload-url:squat.mp4");
    assert_eq!(calls[1], "put:https://storage.test/video-1:1024");
    assert_eq!(calls[2], "process:video-1:Legs");
    assert_eq!(h.analyzer.poll_count("video-1"), 3);
    assert_eq!(calls.last().map(String::as_str), Some("result:video-1"));
}

#[tokio::test]
async fn test_progress_events_are_broadcast() {
    let analyzer =
        ScriptedAnalyzer::new(sample_result()).with_polls("video-1", vec![PollStep::Status("done")]);
    let h = harness(analyzer, fast_config());
    let mut rx = h.event_bus.subscribe();

    h.orchestrator.start_job(submission(SubmitMode::Upload, 16)).await;
    wait_for_terminal(&h.session).await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen.first(), Some(FormcheckEvent::JobStarted { .. })));
    let states: Vec<JobState> = seen
        .iter()
        .filter_map(|e| match e {
            FormcheckEvent::JobProgress { new_state, .. } => Some(*new_state),
            _ => None,
        })
        .collect();
    assert!(states.contains(&JobState::Uploading));
    assert!(states.contains(&JobState::TriggeringProcessing));
    assert!(states.contains(&JobState::Polling));
    assert!(matches!(
        seen.last(),
        Some(FormcheckEvent::JobCompleted { event_count: 3, .. })
    ));
}

#[tokio::test]
async fn test_inline_path_encodes_payload() {
    let h = harness(ScriptedAnalyzer::new(sample_result()), fast_config());

    let job = h.orchestrator.start_job(submission(SubmitMode::Inline, 3)).await;
    assert_eq!(job.state, JobState::Submitting);

    let session = wait_for_terminal(&h.session).await;
    let finished = session.job.as_ref().unwrap();
    assert_eq!(finished.state, JobState::Done);
    assert_eq!(finished.progress.text, "Analysis complete!");
    assert!(session.result.is_some());

    assert_eq!(h.analyzer.calls(), vec!["analyze:Legs:Back Squat".to_string()]);
    // [7, 7, 7] in standard base64
    assert_eq!(h.analyzer.inline_payloads(), vec!["BwcH".to_string()]);
}

#[tokio::test]
async fn test_auto_mode_picks_by_size() {
    let h = harness(ScriptedAnalyzer::new(sample_result()), fast_config());
    let small = h.orchestrator.start_job(submission(SubmitMode::Auto, 64)).await;
    assert_eq!(small.mode, SubmitMode::Inline);
    wait_for_terminal(&h.session).await;

    let analyzer =
        ScriptedAnalyzer::new(sample_result()).with_polls("video-1", vec![PollStep::Status("done")]);
    let h = harness(analyzer, fast_config());
    let large = h.orchestrator.start_job(submission(SubmitMode::Auto, 65)).await;
    assert_eq!(large.mode, SubmitMode::Upload);
    let session = wait_for_terminal(&h.session).await;
    assert_eq!(session.job.unwrap().state, JobState::Done);
}

#[tokio::test]
async fn test_each_step_failure_has_its_reason() {
    let cases = [
        (FailAt::UploadTarget, SubmitMode::Upload, FailureReason::UploadTargetUnavailable),
        (FailAt::Transfer, SubmitMode::Upload, FailureReason::TransferFailed),
        (FailAt::Trigger, SubmitMode::Upload, FailureReason::TriggerRejected),
        (FailAt::FetchResult, SubmitMode::Upload, FailureReason::ResultFetchFailed),
        (FailAt::Inline, SubmitMode::Inline, FailureReason::SubmitFailed),
    ];

    for (fail_at, mode, expected) in cases {
        let analyzer = ScriptedAnalyzer::new(sample_result())
            .failing_at(fail_at)
            .with_polls("video-1", vec![PollStep::Status("done")]);
        let h = harness(analyzer, fast_config());

        h.orchestrator.start_job(submission(mode, 8)).await;
        let session = wait_for_terminal(&h.session).await;

        assert_eq!(session.job.as_ref().unwrap().state, JobState::Failed, "{:?}", fail_at);
        assert_eq!(failure_reason(&session), Some(expected), "{:?}", fail_at);
        assert_eq!(
            session.job.as_ref().unwrap().progress.text,
            expected.status_message()
        );
        assert!(session.result.is_none());
    }
}

#[tokio::test]
async fn test_server_reported_failure() {
    let analyzer = ScriptedAnalyzer::new(sample_result()).with_polls(
        "video-1",
        vec![PollStep::Status("processing"), PollStep::Status("failed")],
    );
    let h = harness(analyzer, fast_config());

    h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    let session = wait_for_terminal(&h.session).await;

    assert_eq!(failure_reason(&session), Some(FailureReason::ProcessingFailed));
    assert_eq!(session.job.unwrap().progress.text, "Processing failed.");
    assert!(!h.analyzer.calls().iter().any(|c| c.starts_with("result:")));
}

#[tokio::test]
async fn test_transient_poll_errors_are_retried() {
    let analyzer = ScriptedAnalyzer::new(sample_result()).with_polls(
        "video-1",
        vec![
            PollStep::TransportError,
            PollStep::TransportError,
            PollStep::Status("processing"),
            PollStep::TransportError,
            PollStep::Status("done"),
        ],
    );
    let h = harness(analyzer, fast_config());

    h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    let session = wait_for_terminal(&h.session).await;

    assert_eq!(session.job.unwrap().state, JobState::Done);
    assert_eq!(h.analyzer.poll_count("video-1"), 5);
}

#[tokio::test]
async fn test_retry_bound_fails_the_job() {
    let analyzer = ScriptedAnalyzer::new(sample_result()).with_polls(
        "video-1",
        vec![PollStep::TransportError; 10],
    );
    let h = harness(analyzer, fast_config());

    h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    let session = wait_for_terminal(&h.session).await;

    assert_eq!(failure_reason(&session), Some(FailureReason::PollTransportError));
    // max_retries = 3 consecutive failures
    assert_eq!(h.analyzer.poll_count("video-1"), 3);
}

#[tokio::test]
async fn test_poll_deadline_fails_the_job() {
    let mut config = fast_config();
    config.polling.timeout = Some(Duration::from_millis(60));
    // Script is empty: analyzer answers "processing" forever
    let h = harness(ScriptedAnalyzer::new(sample_result()), config);

    h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    let session = wait_for_terminal(&h.session).await;

    assert_eq!(failure_reason(&session), Some(FailureReason::PollTimeout));
    assert_eq!(session.job.unwrap().progress.text, "Processing timed out.");
}

#[tokio::test]
async fn test_new_job_while_polling_cancels_previous() {
    // video-1 never finishes; video-2 finishes at once
    let analyzer =
        ScriptedAnalyzer::new(sample_result()).with_polls("video-2", vec![PollStep::Status("done")]);
    let mut config = fast_config();
    config.polling.timeout = None;
    let h = harness(analyzer, config);
    let mut rx = h.event_bus.subscribe();

    let first = h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    wait_for_state(&h.session, JobState::Polling).await;

    let second = h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    assert_ne!(first.id, second.id);
    assert_eq!(second.state, JobState::RequestingUploadTarget);

    let session = wait_for_terminal(&h.session).await;
    let job = session.job.as_ref().unwrap();
    assert_eq!(job.id, second.id);
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.video_id.as_deref(), Some("video-2"));

    // The old poll loop is gone
    let polls_after_cancel = h.analyzer.poll_count("video-1");
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(h.analyzer.poll_count("video-1"), polls_after_cancel);

    // Nothing from the first job lands after its cancellation
    let mut cancelled_seen = false;
    while let Ok(event) = rx.try_recv() {
        if let FormcheckEvent::JobCancelled { job_id, .. } = &event {
            assert_eq!(*job_id, first.id);
            cancelled_seen = true;
            continue;
        }
        if cancelled_seen {
            assert_ne!(event.job_id(), Some(first.id), "late event from cancelled job: {:?}", event);
        }
    }
    assert!(cancelled_seen);
}

#[tokio::test]
async fn test_cancel_current_returns_to_idle() {
    let mut config = fast_config();
    config.polling.timeout = None;
    let h = harness(ScriptedAnalyzer::new(sample_result()), config);

    let job = h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    wait_for_state(&h.session, JobState::Polling).await;

    assert_eq!(h.orchestrator.cancel_current().await, Some(job.id));
    assert!(h.session.read().await.job.is_none());
    assert!(h.orchestrator.current_job().await.is_none());

    let polls = h.analyzer.poll_count("video-1");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.analyzer.poll_count("video-1"), polls);

    // Nothing live to cancel any more
    assert_eq!(h.orchestrator.cancel_current().await, None);
}

#[tokio::test]
async fn test_shutdown_keeps_finished_job() {
    let h = harness(ScriptedAnalyzer::new(sample_result()), fast_config());

    h.orchestrator.start_job(submission(SubmitMode::Inline, 4)).await;
    wait_for_terminal(&h.session).await;

    h.orchestrator.shutdown().await;
    let session = h.session.read().await;
    assert_eq!(session.job.as_ref().unwrap().state, JobState::Done);
    assert!(session.result.is_some());
}

#[tokio::test]
async fn test_replacing_finished_job_is_not_a_cancellation() {
    let h = harness(ScriptedAnalyzer::new(sample_result()), fast_config());

    let first = h.orchestrator.start_job(submission(SubmitMode::Inline, 4)).await;
    wait_for_terminal(&h.session).await;

    let mut rx = h.event_bus.subscribe();
    let second = h.orchestrator.start_job(submission(SubmitMode::Inline, 4)).await;
    let session = wait_for_terminal(&h.session).await;
    assert_eq!(session.job.as_ref().unwrap().id, second.id);

    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, FormcheckEvent::JobCancelled { .. }),
            "finished job {} reported as cancelled",
            first.id
        );
    }
}

#[tokio::test]
async fn test_failure_is_recorded_as_last_error() {
    let analyzer = ScriptedAnalyzer::new(sample_result()).failing_at(FailAt::Trigger);
    let h = harness(analyzer, fast_config());
    let last_error = h.orchestrator.last_error();
    assert!(last_error.read().await.is_none());

    h.orchestrator.start_job(submission(SubmitMode::Upload, 8)).await;
    wait_for_terminal(&h.session).await;

    let message = last_error.read().await.clone().unwrap();
    assert!(message.starts_with("Analyzer refused to process the video."), "{}", message);
    assert!(message.contains("scripted failure"), "{}", message);
}
