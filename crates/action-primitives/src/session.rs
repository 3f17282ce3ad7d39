//! Driver contract the executor needs from a browser.

use std::time::Duration;

use async_trait::async_trait;
use taskpilot_core_types::Observation;

use crate::errors::DriverError;

/// One live browser page, owned by exactly one executor.
///
/// Selector-based operations wait up to `wait` for the target to appear and
/// report [`DriverError::TargetNotFound`] when it never does.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn click(&mut self, selector: &str, wait: Duration) -> Result<(), DriverError>;

    /// Replace the value of an input with `text`.
    async fn fill(&mut self, selector: &str, text: &str, wait: Duration) -> Result<(), DriverError>;

    /// Visible text of the document body.
    async fn page_text(&mut self) -> Result<String, DriverError>;

    async fn observe(&mut self, capture_screenshot: bool) -> Result<Observation, DriverError>;

    async fn shutdown(&mut self) -> Result<(), DriverError>;
}

/// Opens fresh, unshared sessions. One call per task.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError>;

    fn name(&self) -> &str;
}
