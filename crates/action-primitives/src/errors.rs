//! Error types for the action executor

use thiserror::Error;

/// Why a single action failed. Never escapes `execute`; it is folded into
/// an `ActionResult { success: false, .. }`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Parameters did not match the shape the action expects
    #[error("Invalid params for {action}: {reason}")]
    InvalidParams { action: String, reason: String },

    /// The requested action kind is not implemented
    #[error("Action {0} not supported")]
    UnsupportedAction(String),

    /// A bounded wait was exceeded (navigation, selector lookup)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No element matched the selector within the bound
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Browser driver communication error
    #[error("Driver error: {0}")]
    Driver(String),
}

impl ActionError {
    pub fn invalid(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::InvalidParams { .. } => "invalid_params",
            ActionError::UnsupportedAction(_) => "unsupported_action",
            ActionError::Timeout(_) => "timeout",
            ActionError::ElementNotFound(_) => "element_not_found",
            ActionError::Navigation(_) => "navigation",
            ActionError::Extraction(_) => "extraction",
            ActionError::Driver(_) => "driver",
        }
    }
}

/// Errors reported by a [`crate::BrowserSession`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("driver timeout: {0}")]
    Timeout(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("driver I/O error: {0}")]
    Io(String),
}

/// Contract violations and transport failures. These are the only errors
/// `ActionExecutor::execute` returns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// `execute` was called before `launch`
    #[error("executor used before launch")]
    NotLaunched,

    /// The executor was already closed
    #[error("executor already closed")]
    Closed,

    /// The browser session could not be started
    #[error("failed to start browser session: {0}")]
    SessionStartup(String),

    /// A remote executor could not be reached
    #[error("remote executor unreachable: {0}")]
    Transport(String),

    /// A remote executor answered with a non-success status
    #[error("remote executor returned {status}: {message}")]
    Remote { status: u16, message: String },
}

impl ExecutorError {
    /// True for lifecycle violations on the caller's side.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, ExecutorError::NotLaunched | ExecutorError::Closed)
    }
}
