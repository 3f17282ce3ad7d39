//! Type primitive

use taskpilot_core_types::ActionResult;

use super::bounded;
use super::click::GRACE;
use crate::errors::ActionError;
use crate::session::BrowserSession;
use crate::types::ExecutorSettings;

/// Fill `selector` with `text`. Empty text never reaches this point; it is
/// rejected during normalization.
pub(crate) async fn execute_type(
    session: &mut dyn BrowserSession,
    settings: &ExecutorSettings,
    selector: &str,
    text: &str,
) -> Result<ActionResult, ActionError> {
    let wait = settings.selector_timeout;
    bounded(
        wait + GRACE,
        &format!("typing into {selector}"),
        session.fill(selector, text, wait),
    )
    .await?;
    Ok(ActionResult::ok(format!("Typed \"{text}\" into {selector}")))
}
