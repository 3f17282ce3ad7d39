//! The five browser primitives, each a thin bounded call into the session.

mod click;
mod extract;
mod navigate;
mod type_text;
mod wait;

use std::future::Future;
use std::time::Duration;

use taskpilot_core_types::ActionResult;

use crate::errors::{ActionError, DriverError};
use crate::session::BrowserSession;
use crate::types::{BrowserAction, ExecutorSettings};

pub(crate) async fn dispatch(
    session: &mut dyn BrowserSession,
    settings: &ExecutorSettings,
    action: &BrowserAction,
) -> Result<ActionResult, ActionError> {
    match action {
        BrowserAction::Navigate { url } => navigate::execute_navigate(session, settings, url).await,
        BrowserAction::Click { selector } => click::execute_click(session, settings, selector).await,
        BrowserAction::Type { selector, text } => {
            type_text::execute_type(session, settings, selector, text).await
        }
        BrowserAction::Extract => extract::execute_extract(session, settings).await,
        BrowserAction::Wait { ms } => Ok(wait::execute_wait(settings, *ms).await),
    }
}

/// Run a driver call under a hard bound, mapping both the elapsed bound and
/// the driver's own timeout to [`ActionError::Timeout`].
async fn bounded<T, F>(bound: Duration, what: &str, call: F) -> Result<T, ActionError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(bound, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(DriverError::Timeout(detail))) => Err(ActionError::Timeout(format!("{what}: {detail}"))),
        Ok(Err(DriverError::TargetNotFound(target))) => Err(ActionError::ElementNotFound(target)),
        Ok(Err(DriverError::Io(detail))) => Err(ActionError::Driver(format!("{what}: {detail}"))),
        Err(_) => Err(ActionError::Timeout(format!(
            "{what} exceeded {}ms",
            bound.as_millis()
        ))),
    }
}
