//! Wait primitive

use std::time::Duration;

use taskpilot_core_types::ActionResult;
use tracing::debug;

use crate::types::ExecutorSettings;

/// Blocking wait. Never fails; overlong waits are clamped to `max_wait_ms`.
pub(crate) async fn execute_wait(settings: &ExecutorSettings, ms: u64) -> ActionResult {
    let ms = if ms > settings.max_wait_ms {
        debug!(requested = ms, clamped = settings.max_wait_ms, "clamping wait");
        settings.max_wait_ms
    } else {
        ms
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
    ActionResult::ok(format!("Waited {ms}ms"))
}
