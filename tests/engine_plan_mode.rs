mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use action_primitives::{BrowserActionExecutor, ExecutorSettings};
use agent_core::PlannerError;
use common::{
    BrokenSink, RecordingExecutor, ScriptedReasoningClient, StalledPageFactory, StaticPageFactory,
};
use serde_json::json;
use taskpilot::engine::{
    CollectingSink, EngineConfig, FailurePolicy, TaskEngine, SUCCESS_MESSAGE,
};
use taskpilot_core_types::TaskId;

fn engine(client: ScriptedReasoningClient, config: EngineConfig) -> TaskEngine {
    TaskEngine::new(Arc::new(client), config)
}

#[tokio::test]
async fn all_steps_succeed_in_order() {
    let client = ScriptedReasoningClient::with_plan(
        "read example.com",
        vec![
            ("navigate", json!("https://example.com")),
            ("wait", json!(10)),
            ("extract", json!({})),
        ],
    );
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default())
        .run(TaskId::from("t-1"), "read example.com", executor.boxed(), sink.clone())
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, SUCCESS_MESSAGE);
    assert_eq!(outcome.output, Some(json!({ "text": "Example Domain", "truncated": false })));

    let records = sink.records();
    let sequences: Vec<u32> = records.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(records.iter().all(|r| r.success));
    assert_eq!(records[0].result, "Navigated to https://example.com");
    assert_eq!(records[2].result, "Example Domain");
    assert_eq!(records[2].data, outcome.output);
    assert_eq!(executor.probe.actions(), vec!["navigate", "wait", "extract"]);
    assert_eq!(executor.probe.launches(), 1);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn fail_fast_stops_at_first_failure() {
    let client = ScriptedReasoningClient::with_plan(
        "fill form",
        vec![
            ("navigate", json!("https://example.com")),
            ("click", json!("#missing")),
            ("extract", json!({})),
        ],
    );
    let executor = RecordingExecutor::new().failing("click");
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default())
        .run(TaskId::from("t-2"), "fill form", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Step 2 failed"), "{}", outcome.message);
    assert_eq!(outcome.output, None);
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].success);
    assert!(!records[1].success);
    assert_eq!(executor.probe.actions(), vec!["navigate", "click"]);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn continue_policy_runs_remaining_steps() {
    let client = ScriptedReasoningClient::with_plan(
        "best effort",
        vec![
            ("click", json!("#cookie-banner")),
            ("extract", json!({})),
        ],
    );
    let executor = RecordingExecutor::new().failing("click");
    let sink = Arc::new(CollectingSink::new());
    let config = EngineConfig::default().with_failure_policy(FailurePolicy::Continue);

    let outcome = engine(client, config)
        .run(TaskId::from("t-3"), "best effort", executor.boxed(), sink.clone())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.failed_steps, 1);
    assert_eq!(outcome.message, "Mission completed with 1 failed step(s).");
    assert_eq!(sink.records().len(), 2);
}

#[tokio::test]
async fn planner_failure_never_launches() {
    let client = ScriptedReasoningClient::with_plan_error(PlannerError::parse("not json"));
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default())
        .run(TaskId::from("t-4"), "anything", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("not json"), "{}", outcome.message);
    assert!(sink.records().is_empty());
    assert_eq!(executor.probe.launches(), 0);
    assert_eq!(executor.probe.closes(), 0);
    assert!(outcome.logs.iter().all(|line| line.starts_with("[engine] ")));
}

#[tokio::test]
async fn overlong_plan_is_rejected_before_launch() {
    let steps = (0..4).map(|_| ("wait", json!(1))).collect();
    let client = ScriptedReasoningClient::with_plan("too long", steps);
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default().with_max_steps(3))
        .run(TaskId::from("t-5"), "too long", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(sink.records().is_empty());
    assert_eq!(executor.probe.launches(), 0);
}

#[tokio::test]
async fn hung_step_times_out_and_closes() {
    let client = ScriptedReasoningClient::with_plan(
        "slow site",
        vec![
            ("navigate", json!("https://slow.example")),
            ("extract", json!({})),
        ],
    );
    let executor = RecordingExecutor::new().hanging("navigate");
    let sink = Arc::new(CollectingSink::new());
    let config = EngineConfig::default().with_step_timeout(Duration::from_millis(50));

    let outcome = engine(client, config)
        .run(TaskId::from("t-6"), "slow site", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert!(records[0].result.contains("timed out"));
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn executor_error_aborts_even_under_continue() {
    let client = ScriptedReasoningClient::with_plan(
        "remote flake",
        vec![("navigate", json!("https://example.com")), ("extract", json!({}))],
    );
    let executor = RecordingExecutor::new().erroring("navigate");
    let sink = Arc::new(CollectingSink::new());
    let config = EngineConfig::default().with_failure_policy(FailurePolicy::Continue);

    let outcome = engine(client, config)
        .run(TaskId::from("t-7"), "remote flake", executor.boxed(), sink.clone())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Step 1 aborted"), "{}", outcome.message);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn broken_sink_does_not_fail_the_task() {
    let client = ScriptedReasoningClient::with_plan("quiet", vec![("wait", json!(5))]);
    let executor = RecordingExecutor::new();

    let outcome = engine(client, EngineConfig::default())
        .run(TaskId::from("t-8"), "quiet", executor.boxed(), Arc::new(BrokenSink))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.steps, 1);
}

#[tokio::test]
async fn panicking_executor_still_closes() {
    let client = ScriptedReasoningClient::with_plan("boom", vec![("click", json!("#go"))]);
    let executor = RecordingExecutor::new().panicking("click");

    let outcome = engine(client, EngineConfig::default())
        .run(TaskId::from("t-9"), "boom", executor.boxed(), Arc::new(CollectingSink::new()))
        .await;

    assert!(!outcome.success);
    assert_eq!(executor.probe.closes(), 1);
}

#[tokio::test]
async fn example_domain_extract_is_bounded() {
    let client = ScriptedReasoningClient::with_plan(
        "Go to example.com and tell me the title",
        vec![
            ("navigate", json!("https://example.com")),
            ("extract", json!(null)),
        ],
    );
    let factory = Arc::new(StaticPageFactory {
        body: format!("Example Domain {}", "x".repeat(12_000)),
    });
    let executor = BrowserActionExecutor::new(factory, ExecutorSettings::default());
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default())
        .run(
            TaskId::from("t-10"),
            "Go to example.com and tell me the title",
            Box::new(executor),
            sink.clone(),
        )
        .await;

    assert!(outcome.success, "{}", outcome.message);
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].success);
    assert!(records[1].result.starts_with("Example Domain"));
    assert_eq!(records[1].result.chars().count(), 5000);
    assert_eq!(records[1].data.as_ref().unwrap()["truncated"], true);
    let text = outcome.output.as_ref().and_then(|o| o["text"].as_str()).unwrap();
    assert_eq!(text, records[1].result);
}

#[tokio::test]
async fn navigation_bound_fails_the_task_and_shuts_the_session_once() {
    let client = ScriptedReasoningClient::with_plan(
        "open example.com and extract text",
        vec![
            ("navigate", json!("https://example.com")),
            ("extract", json!({})),
        ],
    );
    let factory = Arc::new(StalledPageFactory::default());
    let settings = ExecutorSettings {
        navigation_timeout: Duration::from_millis(50),
        ..ExecutorSettings::default()
    };
    let executor = BrowserActionExecutor::new(factory.clone(), settings);
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, EngineConfig::default())
        .run(
            TaskId::from("t-11"),
            "open example.com and extract text",
            Box::new(executor),
            sink.clone(),
        )
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Step 1 failed"), "{}", outcome.message);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert!(records[0].result.starts_with("Timeout:"), "{}", records[0].result);
    assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn plan_of_exactly_max_steps_runs_to_completion() {
    let config = EngineConfig::default();
    let max_steps = config.max_steps;
    let steps = (0..max_steps).map(|_| ("wait", json!(1))).collect();
    let client = ScriptedReasoningClient::with_plan("wait a lot", steps);
    let executor = RecordingExecutor::new();
    let sink = Arc::new(CollectingSink::new());

    let outcome = engine(client, config)
        .run(TaskId::from("t-12"), "wait a lot", executor.boxed(), sink.clone())
        .await;

    assert!(outcome.success, "{}", outcome.message);
    let sequences: Vec<u32> = sink.records().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=max_steps).collect::<Vec<_>>());
    assert_eq!(executor.probe.closes(), 1);
}
