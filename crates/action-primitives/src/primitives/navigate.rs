//! Navigate primitive

use serde_json::json;
use taskpilot_core_types::ActionResult;
use tracing::debug;

use super::bounded;
use crate::errors::ActionError;
use crate::session::BrowserSession;
use crate::types::ExecutorSettings;

/// Load `url` and report the resulting URL and title.
pub(crate) async fn execute_navigate(
    session: &mut dyn BrowserSession,
    settings: &ExecutorSettings,
    url: &str,
) -> Result<ActionResult, ActionError> {
    debug!(url = %url, "navigating");
    bounded(
        settings.navigation_timeout,
        &format!("navigation to {url}"),
        session.navigate(url),
    )
    .await
    .map_err(|err| match err {
        ActionError::Driver(detail) => ActionError::Navigation(detail),
        other => other,
    })?;

    // Title lookup is best effort; the navigation itself already succeeded.
    let (current_url, title) = match session.observe(false).await {
        Ok(observation) => (observation.url, observation.title),
        Err(_) => (url.to_string(), String::new()),
    };
    Ok(ActionResult::ok(format!("Navigated to {url}"))
        .with_data(json!({ "url": current_url, "title": title })))
}
