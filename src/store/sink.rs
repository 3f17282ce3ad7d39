use std::sync::Arc;

use async_trait::async_trait;
use taskpilot_core_types::{StepRecord, TaskId, TaskLogEntry};

use super::TaskStore;
use crate::engine::StepSink;

/// Writes engine notifications into a [`TaskStore`].
#[derive(Clone)]
pub struct StoreStepSink {
    store: Arc<dyn TaskStore>,
}

impl StoreStepSink {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StepSink for StoreStepSink {
    async fn on_step(&self, record: &StepRecord) -> anyhow::Result<()> {
        self.store.append_step(record.clone()).await?;
        Ok(())
    }

    async fn on_log(&self, task_id: &TaskId, entry: &TaskLogEntry) -> anyhow::Result<()> {
        self.store.append_log(task_id, entry.clone()).await?;
        Ok(())
    }
}
