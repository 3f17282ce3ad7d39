use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use taskpilot_core_types::{StepRecord, Task, TaskId, TaskLogEntry, TaskStatus};

use super::{TaskDocument, TaskStore};
use crate::errors::StoreError;

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, TaskDocument>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, task: Task) -> Result<(), StoreError> {
        match self.tasks.entry(task.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate(task.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(TaskDocument::new(task));
                Ok(())
            }
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(id).map(|doc| doc.task.clone()))
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|doc| doc.task.clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<Task, StoreError> {
        let mut doc = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        doc.set_status(status, message)?;
        Ok(doc.task.clone())
    }

    async fn complete(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: String,
        output: Option<Value>,
    ) -> Result<Task, StoreError> {
        let mut doc = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        doc.complete(status, message, output)?;
        Ok(doc.task.clone())
    }

    async fn append_step(&self, record: StepRecord) -> Result<(), StoreError> {
        let mut doc = self
            .tasks
            .get_mut(&record.task_id)
            .ok_or_else(|| StoreError::NotFound(record.task_id.clone()))?;
        doc.push_step(record)
    }

    async fn steps(&self, id: &TaskId) -> Result<Vec<StepRecord>, StoreError> {
        self.tasks
            .get(id)
            .map(|doc| doc.steps.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn append_log(&self, id: &TaskId, entry: TaskLogEntry) -> Result<(), StoreError> {
        let mut doc = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        doc.logs.push(entry);
        Ok(())
    }

    async fn logs(&self, id: &TaskId) -> Result<Vec<TaskLogEntry>, StoreError> {
        self.tasks
            .get(id)
            .map(|doc| doc.logs.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_is_monotonic() {
        let store = InMemoryTaskStore::new();
        let id = TaskId::from("t-1");
        store
            .create_task(Task::new(id.clone(), "goal", "anonymous"))
            .await
            .unwrap();
        store.update_status(&id, TaskStatus::Running, None).await.unwrap();
        let task = store
            .update_status(&id, TaskStatus::Succeeded, Some("done".into()))
            .await
            .unwrap();
        assert_eq!(task.message.as_deref(), Some("done"));
        assert!(store
            .update_status(&id, TaskStatus::Failed, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryTaskStore::new();
        let task = Task::new(TaskId::from("t-1"), "goal", "anonymous");
        store.create_task(task.clone()).await.unwrap();
        assert!(matches!(
            store.create_task(task).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
