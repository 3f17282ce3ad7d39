//! Task execution engine.
//!
//! Drives the reasoning client and one task-owned action executor through
//! `Idle -> Planning -> Executing(i) -> {Succeeded | Failed}`. Steps run
//! strictly in order, each one is reported through the [`StepSink`] before
//! the next begins, and the executor is closed exactly once whenever it was
//! launched.

mod config;
mod hook;

pub use config::{EngineConfig, EngineMode, FailurePolicy};
pub use hook::{CollectingSink, FanoutSink, NoopSink, StepSink};

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_primitives::{ActionExecutor, ActionKind};
use agent_core::{ActionFeedback, PlannerError, ReasoningClient};
use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{
    ActionResult, LogLevel, Observation, StepRecord, TaskId, TaskLogEntry,
};
use tracing::{debug, error, info, warn};

use crate::metrics;

pub const SUCCESS_MESSAGE: &str = "Mission completed successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Planning,
    Executing(u32),
    Succeeded,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => f.write_str("idle"),
            EngineState::Planning => f.write_str("planning"),
            EngineState::Executing(step) => write!(f, "executing({step})"),
            EngineState::Succeeded => f.write_str("succeeded"),
            EngineState::Failed => f.write_str("failed"),
        }
    }
}

/// Final result of one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub success: bool,
    /// Human-readable final message.
    pub message: String,
    /// Data produced by the last successful step that returned any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub failed_steps: u32,
}

enum Termination {
    Succeeded(String),
    Failed(String),
}

struct StepAttempt {
    success: bool,
    /// Executor-level failure; the task cannot continue regardless of policy.
    fatal: bool,
    feedback: ActionFeedback,
}

impl StepAttempt {
    fn error(&self) -> &str {
        self.feedback
            .result
            .error
            .as_deref()
            .unwrap_or(&self.feedback.result.summary)
    }
}

/// Per-task mutable state. Owns the executor for the duration of the run.
struct TaskRun {
    task_id: TaskId,
    config: EngineConfig,
    executor: Box<dyn ActionExecutor>,
    sink: Arc<dyn StepSink>,
    state: EngineState,
    launched: bool,
    sequence: u32,
    failed_steps: u32,
    output: Option<Value>,
    last_observation: Observation,
    logs: Vec<String>,
}

impl TaskRun {
    fn transition(&mut self, next: EngineState) {
        debug!(task = %self.task_id, from = %self.state, to = %next, "engine state");
        self.state = next;
    }

    async fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = TaskLogEntry::new(level, message);
        match level {
            LogLevel::Info => info!(task = %self.task_id, "{}", entry.message),
            LogLevel::Warn => warn!(task = %self.task_id, "{}", entry.message),
            LogLevel::Error => error!(task = %self.task_id, "{}", entry.message),
        }
        self.logs.push(format!(
            "[engine] {}: {}",
            entry.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.message
        ));
        if let Err(err) = self.sink.on_log(&self.task_id, &entry).await {
            warn!(task = %self.task_id, error = %err, "log hook failed; continuing");
        }
    }

    async fn launch(&mut self) -> Result<(), String> {
        self.executor
            .launch()
            .await
            .map_err(|err| format!("Failed to launch executor: {err}"))?;
        self.launched = true;
        Ok(())
    }

    async fn execute_step(&mut self, reasoning: String, action: &str, params: &Value) -> StepAttempt {
        let started = Instant::now();
        let step_timeout = self.config.step_timeout();
        let call = self.executor.execute(action, params);
        let (result, observation, fatal) = match tokio::time::timeout(step_timeout, call).await {
            Ok(Ok(outcome)) => (outcome.result, outcome.observation, false),
            Ok(Err(err)) => (
                ActionResult::failure(format!("Executor error: {err}")),
                self.last_observation.clone(),
                true,
            ),
            Err(_) => (
                ActionResult::failure(format!(
                    "Step timed out after {}ms",
                    step_timeout.as_millis()
                )),
                self.last_observation.clone(),
                false,
            ),
        };

        self.sequence += 1;
        let success = result.success;
        let summary = if success {
            result.summary.clone()
        } else {
            result.error.clone().unwrap_or_else(|| result.summary.clone())
        };
        let record = StepRecord {
            task_id: self.task_id.clone(),
            sequence: self.sequence,
            reasoning,
            action: action.to_string(),
            params: params.clone(),
            result: step_result_text(&result, &summary),
            success,
            timestamp: Utc::now(),
            data: result.data.clone(),
        };

        let label = action
            .parse::<ActionKind>()
            .map(ActionKind::as_str)
            .unwrap_or("unsupported");
        metrics::record_step(label, success, started.elapsed());

        if let Err(err) = self.sink.on_step(&record).await {
            warn!(task = %self.task_id, step = record.sequence, error = %err, "step hook failed; continuing");
        }

        if success {
            if let Some(data) = &result.data {
                self.output = Some(data.clone());
            }
            self.log(LogLevel::Info, format!("Step {}: {summary}", self.sequence))
                .await;
        } else {
            self.failed_steps += 1;
            self.log(
                LogLevel::Warn,
                format!("Step {} ({action}) failed: {summary}", self.sequence),
            )
            .await;
        }
        self.last_observation = observation.clone();

        StepAttempt {
            success,
            fatal,
            feedback: ActionFeedback {
                action: action.to_string(),
                params: params.clone(),
                result,
                observation,
            },
        }
    }

    /// Close the executor (once, only if launched) and build the outcome.
    async fn finish(mut self, end: Termination) -> TaskOutcome {
        if self.launched {
            self.launched = false;
            if let Err(err) = self.executor.close().await {
                self.log(LogLevel::Warn, format!("Executor close reported: {err}"))
                    .await;
            }
        }

        let (success, message) = match end {
            Termination::Succeeded(message) => (true, message),
            Termination::Failed(message) => (false, message),
        };
        if success {
            self.transition(EngineState::Succeeded);
            self.log(LogLevel::Info, message.clone()).await;
            metrics::record_task_finished("succeeded");
        } else {
            self.transition(EngineState::Failed);
            self.log(LogLevel::Error, format!("Mission failed: {message}"))
                .await;
            metrics::record_task_finished("failed");
        }

        TaskOutcome {
            task_id: self.task_id,
            success,
            message,
            output: if success { self.output } else { None },
            logs: self.logs,
            steps: self.sequence,
            failed_steps: self.failed_steps,
        }
    }
}

/// The control loop. Stateless between runs; share it freely.
pub struct TaskEngine {
    reasoning: Arc<dyn ReasoningClient>,
    config: EngineConfig,
}

impl TaskEngine {
    pub fn new(reasoning: Arc<dyn ReasoningClient>, config: EngineConfig) -> Self {
        Self { reasoning, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reasoning(&self) -> &Arc<dyn ReasoningClient> {
        &self.reasoning
    }

    /// Run `goal` to completion. Never returns an error: every failure inside
    /// the loop becomes a failed [`TaskOutcome`].
    pub async fn run(
        &self,
        task_id: TaskId,
        goal: &str,
        executor: Box<dyn ActionExecutor>,
        sink: Arc<dyn StepSink>,
    ) -> TaskOutcome {
        self.run_with_config(task_id, goal, executor, sink, self.config.clone())
            .await
    }

    /// Same as [`TaskEngine::run`] with per-task overrides of the engine config.
    pub async fn run_with_config(
        &self,
        task_id: TaskId,
        goal: &str,
        executor: Box<dyn ActionExecutor>,
        sink: Arc<dyn StepSink>,
        config: EngineConfig,
    ) -> TaskOutcome {
        let mut run = TaskRun {
            task_id,
            config,
            executor,
            sink,
            state: EngineState::Idle,
            launched: false,
            sequence: 0,
            failed_steps: 0,
            output: None,
            last_observation: Observation::default(),
            logs: Vec::new(),
        };

        let mode = run.config.mode;
        metrics::record_task_started(mode.as_str());
        run.transition(EngineState::Planning);
        run.log(
            LogLevel::Info,
            format!("Starting mission in {mode} mode: {goal}"),
        )
        .await;

        let driven = match mode {
            EngineMode::Plan => AssertUnwindSafe(self.drive_plan(&mut run, goal))
                .catch_unwind()
                .await,
            EngineMode::Step => AssertUnwindSafe(self.drive_steps(&mut run, goal))
                .catch_unwind()
                .await,
        };
        let end = driven.unwrap_or_else(|_| {
            error!(task = %run.task_id, "engine loop panicked");
            Termination::Failed("Internal error while running the task".to_string())
        });
        run.finish(end).await
    }

    async fn reason<T, F>(&self, bound: Duration, call: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, PlannerError>>,
    {
        match tokio::time::timeout(bound, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                metrics::record_reasoning_failure(err.kind());
                Err(format!("Reasoning failed: {err}"))
            }
            Err(_) => {
                metrics::record_reasoning_failure("timeout");
                Err(format!(
                    "Reasoning call timed out after {}ms",
                    bound.as_millis()
                ))
            }
        }
    }

    async fn drive_plan(&self, run: &mut TaskRun, goal: &str) -> Termination {
        let plan = match self.reason(run.config.reasoning_timeout(), self.reasoning.plan(goal)).await {
            Ok(plan) => plan,
            Err(message) => return Termination::Failed(message),
        };
        run.log(
            LogLevel::Info,
            format!("Plan generated with {} steps", plan.len()),
        )
        .await;

        if plan.is_empty() {
            return Termination::Failed("Plan contains no steps".to_string());
        }
        if plan.len() > run.config.max_steps as usize {
            return Termination::Failed(format!(
                "Plan has {} steps, exceeding the limit of {}",
                plan.len(),
                run.config.max_steps
            ));
        }
        if let Err(message) = run.launch().await {
            return Termination::Failed(message);
        }

        for (index, step) in plan.steps.iter().enumerate() {
            run.transition(EngineState::Executing(index as u32));
            let reasoning = if step.instruction.trim().is_empty() {
                format!("Plan step {}", step.id)
            } else {
                step.instruction.clone()
            };
            let attempt = run.execute_step(reasoning, &step.action, &step.params).await;
            if attempt.fatal {
                return Termination::Failed(format!("Step {} aborted: {}", step.id, attempt.error()));
            }
            if !attempt.success && run.config.failure_policy == FailurePolicy::FailFast {
                return Termination::Failed(format!("Step {} failed: {}", step.id, attempt.error()));
            }
        }
        Termination::Succeeded(completion_message(run.failed_steps))
    }

    async fn drive_steps(&self, run: &mut TaskRun, goal: &str) -> Termination {
        let max_steps = run.config.max_steps;
        let mut history: Option<ActionFeedback> = None;

        for index in 0..max_steps {
            let decision = match self
                .reason(
                    run.config.reasoning_timeout(),
                    self.reasoning.decide(goal, history.as_ref()),
                )
                .await
            {
                Ok(decision) => decision,
                Err(message) => return Termination::Failed(message),
            };
            if !run.launched {
                if let Err(message) = run.launch().await {
                    return Termination::Failed(message);
                }
            }

            run.transition(EngineState::Executing(index));
            let attempt = run
                .execute_step(decision.thought.clone(), &decision.action, &decision.params)
                .await;
            if attempt.fatal {
                return Termination::Failed(format!(
                    "Step {} aborted: {}",
                    index + 1,
                    attempt.error()
                ));
            }
            if !attempt.success {
                if run.config.failure_policy == FailurePolicy::FailFast {
                    return Termination::Failed(format!(
                        "Step {} failed: {}",
                        index + 1,
                        attempt.error()
                    ));
                }
            } else if decision.is_done {
                return Termination::Succeeded(completion_message(run.failed_steps));
            }
            history = Some(attempt.feedback);
        }

        Termination::Failed(format!(
            "Step limit of {max_steps} reached without completion"
        ))
    }
}

/// Text stored as a step's result: page text for extractions, otherwise
/// the summary (or the error on failure).
fn step_result_text(result: &ActionResult, summary: &str) -> String {
    result
        .data
        .as_ref()
        .filter(|_| result.success)
        .and_then(|data| data.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| summary.to_string())
}

fn completion_message(failed_steps: u32) -> String {
    if failed_steps == 0 {
        SUCCESS_MESSAGE.to_string()
    } else {
        format!("Mission completed with {failed_steps} failed step(s).")
    }
}
