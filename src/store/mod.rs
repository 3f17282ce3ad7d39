//! Durable task records, step records and task logs.
//!
//! Every implementation enforces the same rules: a task exists before any
//! step references it, step sequences are contiguous from 1, and status only
//! moves forward with the terminal status written once.

mod file;
mod memory;
mod sink;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;
pub use sink::StoreStepSink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{StepRecord, Task, TaskId, TaskLogEntry, TaskStatus};

use crate::errors::StoreError;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: Task) -> Result<(), StoreError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Most recent first.
    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, StoreError>;

    async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<Task, StoreError>;

    /// Write the terminal status together with the final message and output.
    ///
    /// Repeating the status the task already ended with is a no-op, so two
    /// processes sharing one store may both report the same end.
    async fn complete(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: String,
        output: Option<Value>,
    ) -> Result<Task, StoreError>;

    async fn append_step(&self, record: StepRecord) -> Result<(), StoreError>;

    async fn steps(&self, id: &TaskId) -> Result<Vec<StepRecord>, StoreError>;

    async fn append_log(&self, id: &TaskId, entry: TaskLogEntry) -> Result<(), StoreError>;

    async fn logs(&self, id: &TaskId) -> Result<Vec<TaskLogEntry>, StoreError>;

    fn name(&self) -> &str;
}

/// Everything stored for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TaskDocument {
    pub version: u32,
    pub task: Task,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub logs: Vec<TaskLogEntry>,
}

impl TaskDocument {
    pub fn new(task: Task) -> Self {
        Self {
            version: 1,
            task,
            steps: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn push_step(&mut self, record: StepRecord) -> Result<(), StoreError> {
        let expected = self.steps.len() as u32 + 1;
        if record.sequence != expected {
            return Err(StoreError::SequenceGap {
                task: self.task.id.clone(),
                expected,
                got: record.sequence,
            });
        }
        self.steps.push(record);
        Ok(())
    }

    pub fn set_status(&mut self, status: TaskStatus, message: Option<String>) -> Result<(), StoreError> {
        self.task.transition(status)?;
        if message.is_some() {
            self.task.message = message;
        }
        Ok(())
    }

    pub fn complete(
        &mut self,
        status: TaskStatus,
        message: String,
        output: Option<Value>,
    ) -> Result<(), StoreError> {
        if status.is_terminal() && self.task.status == status {
            return Ok(());
        }
        self.task.transition(status)?;
        self.task.message = Some(message);
        self.task.output = output;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(sequence: u32) -> StepRecord {
        StepRecord {
            task_id: TaskId::from("t-1"),
            sequence,
            reasoning: String::new(),
            action: "wait".into(),
            params: json!(10),
            result: "Waited 10ms".into(),
            success: true,
            timestamp: Utc::now(),
            data: None,
        }
    }

    #[test]
    fn rejects_sequence_gaps() {
        let mut doc = TaskDocument::new(Task::new(TaskId::from("t-1"), "goal", "anonymous"));
        doc.push_step(record(1)).unwrap();
        let err = doc.push_step(record(3)).unwrap_err();
        assert!(matches!(err, StoreError::SequenceGap { expected: 2, got: 3, .. }));
        assert!(doc.push_step(record(1)).is_err());
    }

    #[test]
    fn completion_keeps_output_and_tolerates_same_status() {
        let mut doc = TaskDocument::new(Task::new(TaskId::from("t-2"), "goal", "anonymous"));
        doc.set_status(TaskStatus::Running, None).unwrap();
        doc.complete(
            TaskStatus::Succeeded,
            "done".into(),
            Some(json!({ "text": "Example Domain" })),
        )
        .unwrap();
        assert_eq!(doc.task.output, Some(json!({ "text": "Example Domain" })));

        doc.complete(TaskStatus::Succeeded, "again".into(), None).unwrap();
        assert_eq!(doc.task.message.as_deref(), Some("done"));
        assert!(doc.task.output.is_some());

        let err = doc.complete(TaskStatus::Failed, "late".into(), None).unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(_)));
    }
}
