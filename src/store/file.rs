use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use taskpilot_core_types::{StepRecord, Task, TaskId, TaskLogEntry, TaskStatus};
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use super::{TaskDocument, TaskStore};
use crate::errors::StoreError;

/// Filesystem-backed store: one JSON document per task under `root/tasks/`.
///
/// Writes go through a temp file and rename so readers never see a partial
/// document. Read-modify-write cycles are serialized per task; different
/// tasks write concurrently.
pub struct FileTaskStore {
    root: PathBuf,
    locks: DashMap<TaskId, Arc<Mutex<()>>>,
}

impl FileTaskStore {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            root: base_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    fn task_path(&self, id: &TaskId) -> Result<PathBuf, StoreError> {
        let raw = id.as_str();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(raw.to_string()));
        }
        Ok(self.tasks_dir().join(format!("{raw}.json")))
    }

    async fn load(&self, id: &TaskId) -> Result<Option<TaskDocument>, StoreError> {
        let path = self.task_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn load_existing(&self, id: &TaskId) -> Result<TaskDocument, StoreError> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save(&self, doc: &TaskDocument) -> Result<(), StoreError> {
        let dir = self.tasks_dir();
        fs::create_dir_all(&dir).await?;
        let path = self.task_path(&doc.task.id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn lock(&self, id: &TaskId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn modify<F, T>(&self, id: &TaskId, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut TaskDocument) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let _guard = self.lock(id).await;
        let mut doc = self.load_existing(id).await?;
        let value = change(&mut doc)?;
        self.save(&doc).await?;
        Ok(value)
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn create_task(&self, task: Task) -> Result<(), StoreError> {
        let _guard = self.lock(&task.id).await;
        if self.load(&task.id).await?.is_some() {
            return Err(StoreError::Duplicate(task.id));
        }
        self.save(&TaskDocument::new(task)).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.load(id).await?.map(|doc| doc.task))
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        let dir = self.tasks_dir();
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read(&path)
                .await
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice::<TaskDocument>(&bytes).map_err(StoreError::from));
            match parsed {
                Ok(doc) => tasks.push(doc.task),
                Err(err) => warn!(%err, path = %path.display(), "skipping unreadable task document"),
            }
        }
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
        self.modify(id, move |doc| {
            doc.set_status(status, message)?;
            Ok(doc.task.clone())
        })
        .await
    }

    async fn complete(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: String,
        output: Option<Value>,
    ) -> Result<Task, StoreError> {
        self.modify(id, move |doc| {
            doc.complete(status, message, output)?;
            Ok(doc.task.clone())
        })
        .await
    }

    async fn append_step(&self, record: StepRecord) -> Result<(), StoreError> {
        let id = record.task_id.clone();
        self.modify(&id, move |doc| doc.push_step(record)).await
    }

    async fn steps(&self, id: &TaskId) -> Result<Vec<StepRecord>, StoreError> {
        Ok(self.load_existing(id).await?.steps)
    }

    async fn append_log(&self, id: &TaskId, entry: TaskLogEntry) -> Result<(), StoreError> {
        self.modify(id, move |doc| {
            doc.logs.push(entry);
            Ok(())
        })
        .await
    }

    async fn logs(&self, id: &TaskId) -> Result<Vec<TaskLogEntry>, StoreError> {
        Ok(self.load_existing(id).await?.logs)
    }

    fn name(&self) -> &str {
        "file"
    }
}
