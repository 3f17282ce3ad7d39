mod common;

use std::sync::Arc;
use std::time::Duration;

use agent_core::MockReasoningClient;
use common::{RecordingExecutor, RecordingProvider};
use taskpilot::auth::ApiKeyPolicy;
use taskpilot::engine::{EngineConfig, TaskEngine};
use taskpilot::gateway::{
    LocalTaskRunner, RemoteRunnerConfig, RemoteTaskRunner, TaskGateway,
};
use taskpilot::server::{build_router, AppState, SessionRegistry};
use taskpilot::store::{FileTaskStore, InMemoryTaskStore, TaskStore};
use taskpilot::GatewayError;
use taskpilot_core_types::{TaskId, TaskStatus};
use tokio::net::TcpListener;

fn local_gateway(store: Arc<dyn TaskStore>, executor: RecordingExecutor) -> TaskGateway {
    let engine = Arc::new(TaskEngine::new(
        Arc::new(MockReasoningClient),
        EngineConfig::default(),
    ));
    let runner = LocalTaskRunner::new(
        engine,
        Arc::new(RecordingProvider { template: executor }),
        store.clone(),
    );
    TaskGateway::new(store, Arc::new(runner))
}

#[tokio::test]
async fn submit_and_wait_persists_steps_logs_and_status() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let gateway = local_gateway(store.clone(), RecordingExecutor::new());

    let outcome = gateway
        .submit_and_wait("Go to https://example.com and read it", Some("alice".into()))
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    let task = store.get_task(&outcome.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.user_id, "alice");
    assert!(task.finished_at.is_some());

    assert_eq!(task.output.as_ref().unwrap()["text"], "Example Domain");

    let steps = store.steps(&outcome.task_id).await.unwrap();
    let actions: Vec<&str> = steps.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(actions, vec!["navigate", "extract"]);
    assert_eq!(steps[1].result, "Example Domain");
    assert!(!store.logs(&outcome.task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_goal_is_rejected_without_a_task() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let gateway = local_gateway(store.clone(), RecordingExecutor::new());

    let err = gateway.submit("   ", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(_)));
    assert!(store.list_tasks(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn background_submission_reaches_terminal_status() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let gateway = local_gateway(store.clone(), RecordingExecutor::new().failing("extract"));

    let task_id = gateway.submit("read https://example.com", None).await.unwrap();
    let task = store.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.user_id, "anonymous");

    let mut status = task.status;
    for _ in 0..200 {
        status = store.get_task(&task_id).await.unwrap().unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, TaskStatus::Failed);
    assert_eq!(store.steps(&task_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn execute_existing_registers_unknown_task_in_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(FileTaskStore::new(dir.path()));
    let gateway = local_gateway(store.clone(), RecordingExecutor::new());

    let outcome = gateway
        .execute_existing(TaskId::from("job-42"), "open https://example.com")
        .await
        .unwrap();
    assert!(outcome.success);

    let task = store.get_task(&TaskId::from("job-42")).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);

    let again = gateway
        .execute_existing(TaskId::from("job-42"), "open https://example.com")
        .await
        .unwrap_err();
    assert!(matches!(again, GatewayError::InvalidRequest(_)));
}

#[tokio::test]
async fn unreachable_remote_engine_fails_the_task() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let runner = RemoteTaskRunner::new(
        RemoteRunnerConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: Some("secret".into()),
            timeout: Duration::from_secs(2),
        },
        store.clone(),
    )
    .unwrap();
    let gateway = TaskGateway::new(store.clone(), Arc::new(runner));

    let err = gateway
        .submit_and_wait("open https://example.com", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::DelegationTransport(_)));

    let tasks = store.list_tasks(10).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert!(store.steps(&tasks[0].id).await.unwrap().is_empty());
}

/// Serve a local engine over HTTP and return its base URL.
async fn spawn_engine_server(store: Arc<dyn TaskStore>, api_key: &str) -> String {
    let provider = Arc::new(RecordingProvider {
        template: RecordingExecutor::new(),
    });
    let engine = Arc::new(TaskEngine::new(
        Arc::new(MockReasoningClient),
        EngineConfig::default(),
    ));
    let runner = LocalTaskRunner::new(engine, provider.clone(), store.clone());
    let state = AppState::new(
        TaskGateway::new(store, Arc::new(runner)),
        SessionRegistry::new(provider, 2),
        ApiKeyPolicy::new(Some(api_key.to_string())),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn remote_gateway(store: Arc<dyn TaskStore>, base_url: String) -> TaskGateway {
    let runner = RemoteTaskRunner::new(
        RemoteRunnerConfig {
            base_url,
            api_key: Some("secret".into()),
            timeout: Duration::from_secs(10),
        },
        store.clone(),
    )
    .unwrap();
    TaskGateway::new(store, Arc::new(runner))
}

#[tokio::test]
async fn remote_dispatch_brings_back_steps_and_logs() {
    let engine_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let base_url = spawn_engine_server(engine_store.clone(), "secret").await;
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let gateway = remote_gateway(store.clone(), base_url);

    let outcome = gateway
        .submit_and_wait("Go to https://example.com and read it", Some("bob".into()))
        .await
        .unwrap();
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.steps, 2);

    let task = store.get_task(&outcome.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.output.as_ref().unwrap()["text"], "Example Domain");

    let steps = store.steps(&outcome.task_id).await.unwrap();
    let sequences: Vec<u32> = steps.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(steps[0].action, "navigate");
    assert_eq!(steps[1].result, "Example Domain");
    assert_eq!(
        store.logs(&outcome.task_id).await.unwrap(),
        engine_store.logs(&outcome.task_id).await.unwrap()
    );
}

#[tokio::test]
async fn remote_dispatch_over_a_shared_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let engine_store: Arc<dyn TaskStore> = Arc::new(FileTaskStore::new(dir.path()));
    let base_url = spawn_engine_server(engine_store, "secret").await;
    let store: Arc<dyn TaskStore> = Arc::new(FileTaskStore::new(dir.path()));
    let gateway = remote_gateway(store.clone(), base_url);

    let outcome = gateway
        .submit_and_wait("Go to https://example.com and read it", None)
        .await
        .unwrap();
    assert!(outcome.success, "{}", outcome.message);

    let task = store.get_task(&outcome.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(store.steps(&outcome.task_id).await.unwrap().len(), 2);
}
