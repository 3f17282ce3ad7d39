//! Click primitive

use taskpilot_core_types::ActionResult;

use super::bounded;
use crate::errors::ActionError;
use crate::session::BrowserSession;
use crate::types::ExecutorSettings;

pub(crate) async fn execute_click(
    session: &mut dyn BrowserSession,
    settings: &ExecutorSettings,
    selector: &str,
) -> Result<ActionResult, ActionError> {
    let wait = settings.selector_timeout;
    bounded(
        wait + GRACE,
        &format!("click on {selector}"),
        session.click(selector, wait),
    )
    .await?;
    Ok(ActionResult::ok(format!("Clicked {selector}")))
}

/// Headroom over the driver's own selector wait before the hard bound fires.
pub(super) const GRACE: std::time::Duration = std::time::Duration::from_millis(500);
