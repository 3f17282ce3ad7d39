//! Notification hook the engine reports steps and log lines through.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskpilot_core_types::{StepRecord, TaskId, TaskLogEntry};

/// Receives step records in execution order.
///
/// The engine awaits each call before moving on, so implementations see
/// records strictly in sequence. Errors are logged by the engine and never
/// abort the task.
#[async_trait]
pub trait StepSink: Send + Sync {
    async fn on_step(&self, record: &StepRecord) -> anyhow::Result<()>;

    async fn on_log(&self, _task_id: &TaskId, _entry: &TaskLogEntry) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl StepSink for NoopSink {
    async fn on_step(&self, _record: &StepRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Forwards to several sinks in order. Every sink is called even when an
/// earlier one fails; the first error is returned.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StepSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StepSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl StepSink for FanoutSink {
    async fn on_step(&self, record: &StepRecord) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.on_step(record).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn on_log(&self, task_id: &TaskId, entry: &TaskLogEntry) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.on_log(task_id, entry).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Keeps every record in memory. Handy for the CLI and tests.
#[derive(Default, Clone)]
pub struct CollectingSink {
    records: Arc<Mutex<Vec<StepRecord>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StepRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl StepSink for CollectingSink {
    async fn on_step(&self, record: &StepRecord) -> anyhow::Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
