mod common;

use std::sync::Arc;

use agent_core::PlannerError;
use common::{decision, RecordingExecutor, ScriptedReasoningClient};
use serde_json::json;
use taskpilot::engine::{CollectingSink, EngineConfig, FailurePolicy, TaskEngine, SUCCESS_MESSAGE};
use taskpilot_core_types::TaskId;

#[tokio::test]
async fn done_decision_executes_its_action_then_completes() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(vec![
        decision("navigate", json!("https://example.com"), false),
        decision("extract", json!({}), true),
    ]));
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = TaskEngine::new(client.clone(), EngineConfig::stepwise())
        .run(TaskId::from("s-1"), "read example.com", executor.boxed(), sink.clone())
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, SUCCESS_MESSAGE);
    assert_eq!(executor.probe.actions(), vec!["navigate", "extract"]);
    assert_eq!(sink.records().len(), 2);
    assert_eq!(executor.probe.closes(), 1);

    let seen = client.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_none());
    let previous = seen[1].as_ref().unwrap();
    assert_eq!(previous.action, "navigate");
    assert_eq!(previous.observation.url, "https://example.com");
}

#[tokio::test]
async fn stops_at_step_limit() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(Vec::new()));
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());
    let config = EngineConfig::stepwise().with_max_steps(3);

    let outcome = TaskEngine::new(client, config)
        .run(TaskId::from("s-2"), "never done", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Step limit of 3 reached without completion");
    assert_eq!(sink.records().len(), 3);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn first_decision_failure_leaves_executor_untouched() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(vec![Err(
        PlannerError::schema("missing action"),
    )]));
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = TaskEngine::new(client, EngineConfig::stepwise())
        .run(TaskId::from("s-3"), "goal", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(sink.records().is_empty());
    assert_eq!(executor.probe.launches(), 0);
    assert_eq!(executor.probe.closes(), 0);
}

#[tokio::test]
async fn later_decision_failure_closes_once() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(vec![
        decision("navigate", json!("https://example.com"), false),
        Err(PlannerError::transport("model unavailable")),
    ]));
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = TaskEngine::new(client, EngineConfig::stepwise())
        .run(TaskId::from("s-4"), "goal", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("model unavailable"));
    assert_eq!(sink.records().len(), 1);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn continue_policy_feeds_failure_back() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(vec![
        decision("click", json!("#gone"), false),
        decision("extract", json!({}), true),
    ]));
    let executor = RecordingExecutor::new().failing("click");
    let sink = Arc::new(CollectingSink::new());
    let config = EngineConfig::stepwise().with_failure_policy(FailurePolicy::Continue);

    let outcome = TaskEngine::new(client.clone(), config)
        .run(TaskId::from("s-5"), "goal", executor.boxed(), sink.clone())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.failed_steps, 1);
    let seen = client.seen();
    assert!(!seen[1].as_ref().unwrap().result.success);
}

#[tokio::test]
async fn failed_done_step_is_not_completion() {
    let client = Arc::new(ScriptedReasoningClient::with_decisions(vec![decision(
        "click",
        json!("#submit"),
        true,
    )]));
    let executor = RecordingExecutor::new().failing("click");
    let sink = Arc::new(CollectingSink::new());

    let outcome = TaskEngine::new(client, EngineConfig::stepwise())
        .run(TaskId::from("s-6"), "goal", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Step 1 failed"));
}
