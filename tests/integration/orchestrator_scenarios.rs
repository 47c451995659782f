//! End-to-end orchestrator scenarios over scripted backends.

use super::test_utils::{commit_request, orchestrator_for, ScriptedBackend};
use chorus::choice::FinalState;
use chorus::error::ApiError;
use chorus::orchestrator::OrchestratorLifecycle;
use chorus::sink::{AttemptRecord, AttemptSink};
use chorus::types::MessageStyle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_three_transport_failures_are_all_failed() {
    let backends = [
        ScriptedBackend::fail("openai", 50, || {
            ApiError::ProviderAuthFailed("status 401: invalid api key".to_string())
        }),
        ScriptedBackend::fail("claude", 10, || {
            ApiError::ProviderRateLimit("status 429: slow down".to_string())
        }),
        ScriptedBackend::fail("llama", 30, || {
            ApiError::ProviderConnection("connection refused".to_string())
        }),
    ];
    let (mut orchestrator, identities) = orchestrator_for(&backends, None);
    let handle = orchestrator
        .start(commit_request(MessageStyle::Conventional), identities)
        .await
        .unwrap();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.final_state, FinalState::AllFailed);
    assert_eq!(report.choices.len(), 3);
    assert!(report.choices.iter().all(|c| c.is_error && c.disabled));
    let order: Vec<&str> = report.choices.iter().map(|c| c.backend.as_str()).collect();
    assert_eq!(order, vec!["claude", "llama", "openai"]);
    assert!(report.choices[0].label.starts_with("claude: Rate limited"));
    assert!(report.choices[2].label.starts_with("openai: Authentication failed"));
}

#[tokio::test(start_paused = true)]
async fn test_two_successes_one_failure_is_partial_success() {
    let backends = [
        ScriptedBackend::reply("openai", 20, r#"{"subject":"fix(core): Repair parser"}"#),
        ScriptedBackend::fail("claude", 40, || ApiError::ProviderTimeout(30_000)),
        ScriptedBackend::reply(
            "llama",
            60,
            "Sure! Here you go:\n```json\n[{\"subject\":\"FEAT: add repair helper\"}]\n```",
        ),
    ];
    let (mut orchestrator, identities) = orchestrator_for(&backends, None);
    let handle = orchestrator
        .start(commit_request(MessageStyle::Conventional), identities)
        .await
        .unwrap();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.final_state, FinalState::PartialOrFullSuccess);
    assert_eq!(report.choices.len(), 3);
    assert_eq!(report.selectable().count(), 2);
    assert_eq!(report.choices[0].label, "fix(core): repair parser");
    assert!(report.choices[1].is_error && report.choices[1].disabled);
    assert_eq!(report.choices[2].label, "feat: add repair helper");
    assert_eq!(report.progress.succeeded, 2);
    assert_eq!(report.progress.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unusable_reply_is_one_error_entry() {
    let backends = [
        ScriptedBackend::reply("chatty", 5, "I think this change is great!"),
        ScriptedBackend::reply("good", 10, r#"[{"subject":"feat: a"},{"subject":"feat: b"}]"#),
    ];
    let (mut orchestrator, identities) = orchestrator_for(&backends, None);
    let handle = orchestrator
        .start(commit_request(MessageStyle::Plain), identities)
        .await
        .unwrap();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.choices.len(), 3);
    assert!(report.choices[0].is_error);
    assert!(report.choices[0].label.contains("no usable message"));
    assert_eq!(report.selectable().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_drops_late_arrivals_and_finalizes_immediately() {
    let backends = [
        ScriptedBackend::reply("fast", 10, r#"{"subject":"feat: fast"}"#),
        ScriptedBackend::reply("slow", 60_000, r#"{"subject":"feat: slow"}"#),
    ];
    let (mut orchestrator, identities) = orchestrator_for(&backends, None);
    let mut handle = orchestrator
        .start(commit_request(MessageStyle::Conventional), identities)
        .await
        .unwrap();

    let first = handle.next_choice().await.unwrap();
    assert_eq!(first.backend, "fast");

    let started = tokio::time::Instant::now();
    handle.cancel();
    let mut lifecycle = handle.lifecycle_watch();
    let report = handle.finish().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(report.cancelled);
    assert_eq!(report.choices.len(), 1);
    assert_eq!(*lifecycle.borrow_and_update(), OrchestratorLifecycle::Finalized);

    // The slow backend would have answered by now; nothing may change.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(orchestrator.lifecycle(), OrchestratorLifecycle::Finalized);
}

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<AttemptRecord>>,
}

impl AttemptSink for CollectingSink {
    fn record(&self, entry: AttemptRecord) {
        self.records.lock().push(entry);
    }
}

#[tokio::test(start_paused = true)]
async fn test_every_backend_attempt_is_logged_once() {
    let sink = Arc::new(CollectingSink::default());
    let backends = [
        ScriptedBackend::reply("a", 5, r#"{"subject":"feat: a"}"#),
        ScriptedBackend::fail("b", 5, || ApiError::ProviderError("boom".to_string())),
    ];
    let (mut orchestrator, identities) =
        orchestrator_for(&backends, Some(sink.clone() as Arc<dyn AttemptSink>));
    let request = commit_request(MessageStyle::Plain);
    let request_id = request.request_id.clone();
    orchestrator
        .start(request, identities)
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

    let records = sink.records.lock();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.request_id == request_id));
    let failed = records.iter().find(|r| r.backend == "b").unwrap();
    assert!(!failed.ok);
    assert_eq!(failed.failure_kind.as_deref(), Some("unknown"));
    let ok = records.iter().find(|r| r.backend == "a").unwrap();
    assert_eq!(ok.reply.as_deref(), Some(r#"{"subject":"feat: a"}"#));
}

#[tokio::test(start_paused = true)]
async fn test_second_start_supersedes_first() {
    let backends = [
        ScriptedBackend::reply("slow", 60_000, r#"{"subject":"feat: slow"}"#),
        ScriptedBackend::reply("fast", 5, r#"{"subject":"feat: fast"}"#),
    ];
    let (mut orchestrator, identities) = orchestrator_for(&backends, None);
    let first = orchestrator
        .start(commit_request(MessageStyle::Plain), vec![identities[0].clone()])
        .await
        .unwrap();
    let second = orchestrator
        .start(commit_request(MessageStyle::Plain), vec![identities[1].clone()])
        .await
        .unwrap();

    let first = first.finish().await.unwrap();
    let second = second.finish().await.unwrap();
    assert!(first.cancelled && first.choices.is_empty());
    assert_eq!(second.choices.len(), 1);
    assert_eq!(second.choices[0].backend, "fast");
}
