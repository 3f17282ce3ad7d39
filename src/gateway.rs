//! Task gateway: accepts goals, registers tasks and hands them to a runner.
//!
//! The runner is either the in-process engine or a remote engine reached
//! over HTTP. Task status is owned here: `created -> running` on
//! acceptance, then the terminal status once the runner returns.

use std::sync::Arc;
use std::time::Duration;

use action_primitives::API_KEY_HEADER;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{LogLevel, StepRecord, Task, TaskId, TaskLogEntry, TaskStatus};
use tracing::{debug, error, info, warn};

use crate::engine::{TaskEngine, TaskOutcome};
use crate::errors::GatewayError;
use crate::runtime::ExecutorProvider;
use crate::store::{StoreStepSink, TaskStore};

pub const ANONYMOUS_USER: &str = "anonymous";

/// Body of `POST /v1/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskRequest {
    pub goal: String,
    pub task_id: TaskId,
}

/// Response of `POST /v1/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub failed_steps: u32,
    /// Every step the task has recorded, in sequence order.
    #[serde(default)]
    pub records: Vec<StepRecord>,
    #[serde(default)]
    pub log_entries: Vec<TaskLogEntry>,
}

impl From<TaskOutcome> for ExecuteTaskResponse {
    fn from(outcome: TaskOutcome) -> Self {
        Self {
            success: outcome.success,
            output: outcome.output,
            logs: outcome.logs,
            message: Some(outcome.message),
            steps: outcome.steps,
            failed_steps: outcome.failed_steps,
            records: Vec::new(),
            log_entries: Vec::new(),
        }
    }
}

/// Runs one registered task to completion.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task_id: &TaskId, goal: &str) -> Result<TaskOutcome, GatewayError>;

    fn name(&self) -> &str;
}

/// Runs the engine in-process with a fresh executor per task.
pub struct LocalTaskRunner {
    engine: Arc<TaskEngine>,
    executors: Arc<dyn ExecutorProvider>,
    store: Arc<dyn TaskStore>,
}

impl LocalTaskRunner {
    pub fn new(
        engine: Arc<TaskEngine>,
        executors: Arc<dyn ExecutorProvider>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            engine,
            executors,
            store,
        }
    }
}

#[async_trait]
impl TaskRunner for LocalTaskRunner {
    async fn run(&self, task_id: &TaskId, goal: &str) -> Result<TaskOutcome, GatewayError> {
        let executor = self
            .executors
            .create()
            .map_err(|err| GatewayError::ExecutorUnavailable(err.to_string()))?;
        let sink = Arc::new(StoreStepSink::new(self.store.clone()));
        Ok(self.engine.run(task_id.clone(), goal, executor, sink).await)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[derive(Clone, Debug)]
pub struct RemoteRunnerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Whole-task bound; a remote run holds the request open until it ends.
    pub timeout: Duration,
}

/// Delegates the whole task to a remote engine's `/v1/execute`.
///
/// The remote engine records steps in its own store; they come back with the
/// response and are replayed into the local store so the task's history is
/// readable here too.
pub struct RemoteTaskRunner {
    client: Client,
    config: RemoteRunnerConfig,
    store: Arc<dyn TaskStore>,
}

impl RemoteTaskRunner {
    pub fn new(config: RemoteRunnerConfig, store: Arc<dyn TaskStore>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::DelegationTransport(err.to_string()))?;
        Ok(Self {
            client,
            config,
            store,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/execute", self.config.base_url.trim_end_matches('/'))
    }

    /// Append what the local store does not have yet. A store shared with
    /// the remote engine already holds everything and is left untouched.
    async fn replay(
        &self,
        task_id: &TaskId,
        records: Vec<StepRecord>,
        entries: Vec<TaskLogEntry>,
    ) -> Result<(), GatewayError> {
        let known_steps = self.store.steps(task_id).await?.len() as u32;
        let mut records: Vec<StepRecord> = records
            .into_iter()
            .filter(|record| record.sequence > known_steps)
            .collect();
        records.sort_by_key(|record| record.sequence);
        let replayed = records.len();
        for mut record in records {
            record.task_id = task_id.clone();
            self.store.append_step(record).await?;
        }

        let known_logs = self.store.logs(task_id).await?.len();
        for entry in entries.into_iter().skip(known_logs) {
            self.store.append_log(task_id, entry).await?;
        }
        debug!(task = %task_id, steps = replayed, "replayed remote history");
        Ok(())
    }
}

#[async_trait]
impl TaskRunner for RemoteTaskRunner {
    async fn run(&self, task_id: &TaskId, goal: &str) -> Result<TaskOutcome, GatewayError> {
        let body = ExecuteTaskRequest {
            goal: goal.to_string(),
            task_id: task_id.clone(),
        };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::DelegationTransport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::DelegationTransport(format!(
                "remote engine returned {status}: {detail}"
            )));
        }

        let payload: ExecuteTaskResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::DelegationTransport(format!("invalid response: {err}")))?;
        self.replay(task_id, payload.records, payload.log_entries)
            .await?;
        let message = payload.message.unwrap_or_else(|| {
            if payload.success {
                crate::engine::SUCCESS_MESSAGE.to_string()
            } else {
                "Remote execution failed".to_string()
            }
        });
        Ok(TaskOutcome {
            task_id: task_id.clone(),
            success: payload.success,
            message,
            output: payload.output,
            logs: payload.logs,
            steps: payload.steps,
            failed_steps: payload.failed_steps,
        })
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[derive(Clone)]
pub struct TaskGateway {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TaskRunner>,
}

impl TaskGateway {
    pub fn new(store: Arc<dyn TaskStore>, runner: Arc<dyn TaskRunner>) -> Self {
        Self { store, runner }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    /// Register the task and start it in the background.
    ///
    /// Returns once the task is durable and `running`; the outcome lands in
    /// the store.
    pub async fn submit(&self, goal: &str, user_id: Option<String>) -> Result<TaskId, GatewayError> {
        let task = self.register(TaskId::new(), goal, user_id).await?;
        let store = self.store.clone();
        let runner = self.runner.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move {
            if let Err(err) = drive(store, runner, task.id, task.goal).await {
                warn!(%err, "background task ended with gateway error");
            }
        });
        Ok(task_id)
    }

    /// Register the task and run it on the caller's task.
    pub async fn submit_and_wait(
        &self,
        goal: &str,
        user_id: Option<String>,
    ) -> Result<TaskOutcome, GatewayError> {
        let task = self.register(TaskId::new(), goal, user_id).await?;
        drive(self.store.clone(), self.runner.clone(), task.id, task.goal).await
    }

    /// Run a task under a caller-chosen id, registering it when unknown.
    ///
    /// A task that is `running` with no recorded steps is adopted: that is
    /// a delegating gateway sharing this store.
    pub async fn execute_existing(
        &self,
        task_id: TaskId,
        goal: &str,
    ) -> Result<TaskOutcome, GatewayError> {
        let goal = validate_goal(goal)?;
        match self.store.get_task(&task_id).await? {
            None => {
                self.register(task_id.clone(), goal, None).await?;
            }
            Some(task) if task.status == TaskStatus::Created => {
                self.store
                    .update_status(&task_id, TaskStatus::Running, None)
                    .await?;
            }
            Some(task) => {
                let adoptable = task.status == TaskStatus::Running
                    && self.store.steps(&task_id).await?.is_empty();
                if !adoptable {
                    return Err(GatewayError::invalid(format!(
                        "task {} is already {}",
                        task.id, task.status
                    )));
                }
                info!(task = %task_id, "adopting running task");
            }
        }
        drive(self.store.clone(), self.runner.clone(), task_id, goal.to_string()).await
    }

    /// [`TaskGateway::execute_existing`] plus the task's recorded steps and
    /// log entries, as served by `POST /v1/execute`.
    pub async fn execute_report(
        &self,
        task_id: TaskId,
        goal: &str,
    ) -> Result<ExecuteTaskResponse, GatewayError> {
        let outcome = self.execute_existing(task_id.clone(), goal).await?;
        let mut response = ExecuteTaskResponse::from(outcome);
        response.records = self.store.steps(&task_id).await?;
        response.log_entries = self.store.logs(&task_id).await?;
        Ok(response)
    }

    async fn register(
        &self,
        id: TaskId,
        goal: &str,
        user_id: Option<String>,
    ) -> Result<Task, GatewayError> {
        let goal = validate_goal(goal)?;
        let user_id = user_id
            .filter(|user| !user.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let task = Task::new(id, goal, user_id);
        self.store.create_task(task.clone()).await?;
        let task = self
            .store
            .update_status(&task.id, TaskStatus::Running, None)
            .await?;
        info!(task = %task.id, user = %task.user_id, runner = self.runner.name(), "task accepted");
        Ok(task)
    }
}

fn validate_goal(goal: &str) -> Result<&str, GatewayError> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(GatewayError::invalid("Goal is required"));
    }
    Ok(goal)
}

async fn drive(
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TaskRunner>,
    task_id: TaskId,
    goal: String,
) -> Result<TaskOutcome, GatewayError> {
    let result = runner.run(&task_id, &goal).await;
    let (status, message, output) = match &result {
        Ok(outcome) if outcome.success => (
            TaskStatus::Succeeded,
            outcome.message.clone(),
            outcome.output.clone(),
        ),
        Ok(outcome) => (TaskStatus::Failed, outcome.message.clone(), None),
        Err(err) => {
            let message = err.to_string();
            if let Err(log_err) = store
                .append_log(&task_id, TaskLogEntry::new(LogLevel::Error, message.clone()))
                .await
            {
                warn!(task = %task_id, %log_err, "failed to record runner error");
            }
            (TaskStatus::Failed, message, None)
        }
    };

    match store.complete(&task_id, status, message, output).await {
        Ok(task) => info!(task = %task.id, status = %task.status, "task finished"),
        Err(err) => error!(task = %task_id, %err, "failed to record terminal status"),
    }
    result
}
