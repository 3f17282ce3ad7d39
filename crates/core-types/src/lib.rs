//! Shared primitives for TaskPilot.
//!
//! These are the persisted shapes external observers stream and query, so the
//! wire names (camelCase) are part of the contract.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a task record is mutated against its lifecycle rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("illegal task status transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("unknown task status: {0}")]
    UnknownStatus(String),
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle of a task. Transitions only move forward:
/// `created -> running -> {succeeded | failed}`.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TaskStatus {
    Created,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    ///
    /// `created -> failed` is allowed so a task whose dispatch never started
    /// can still be closed out.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Created, TaskStatus::Running)
                | (TaskStatus::Created, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(TaskStatus::Created),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Durable record of one submitted goal.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub goal: String,
    pub user_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub finished_at: Option<DateTime<Utc>>,
    /// Human-readable final message, set together with the terminal status.
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub message: Option<String>,
    /// Data produced by the run, e.g. extracted page text.
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub output: Option<Value>,
}

impl Task {
    pub fn new(id: TaskId, goal: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id,
            goal: goal.into(),
            user_id: user_id.into(),
            status: TaskStatus::Created,
            created_at: Utc::now(),
            finished_at: None,
            message: None,
            output: None,
        }
    }

    /// Move to `next`, rejecting backwards or repeated terminal transitions.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// One executed action, in execution order. Sequence numbers start at 1.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub task_id: TaskId,
    pub sequence: u32,
    pub reasoning: String,
    pub action: String,
    pub params: Value,
    pub result: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// Structured payload of the action, when it produced one.
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub data: Option<Value>,
}

/// Outcome of exactly one browser action.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub summary: String,
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub data: Option<Value>,
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            data: None,
            error: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            summary: format!("Failed: {error}"),
            data: None,
            error: Some(error),
        }
    }
}

/// Post-action snapshot of the browser.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub url: String,
    pub title: String,
    /// Base64 encoded PNG.
    #[cfg_attr(
        feature = "serde-full",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub screenshot: Option<String>,
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("info"),
            LogLevel::Warn => f.write_str("warn"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct TaskLogEntry {
    pub message: String,
    pub level: LogLevel,
    pub created_at: DateTime<Utc>,
}

impl TaskLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        use TaskStatus::*;
        assert!(Created.can_transition_to(Running));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Created));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Succeeded.can_transition_to(Succeeded));
    }

    #[test]
    fn terminal_status_is_set_once() {
        let mut task = Task::new(TaskId::new(), "find the weather", "anonymous");
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Failed).unwrap();
        assert!(task.finished_at.is_some());

        let err = task.transition(TaskStatus::Succeeded).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: TaskStatus::Failed,
                to: TaskStatus::Succeeded
            }
        );
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Running".parse::<TaskStatus>().unwrap(), TaskStatus::Running);
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn failure_result_carries_error() {
        let result = ActionResult::failure("Timeout waiting for #q");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Timeout waiting for #q"));
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn step_record_uses_camel_case_on_the_wire() {
        let record = StepRecord {
            task_id: TaskId::from("t-1"),
            sequence: 1,
            reasoning: "open the page".into(),
            action: "navigate".into(),
            params: serde_json::json!("https://example.com"),
            result: "Navigated to https://example.com".into(),
            success: true,
            timestamp: Utc::now(),
            data: Some(serde_json::json!({ "title": "Example Domain" })),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["taskId"], "t-1");
        assert_eq!(value["sequence"], 1);
        assert_eq!(value["data"]["title"], "Example Domain");
        assert!(value.get("task_id").is_none());

        let bare = StepRecord { data: None, ..record };
        assert!(serde_json::to_value(&bare).unwrap().get("data").is_none());
    }
}
