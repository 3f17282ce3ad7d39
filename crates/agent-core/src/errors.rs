use thiserror::Error;

/// Errors emitted while obtaining or validating a reasoning decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// Model output was not valid JSON once fences were stripped.
    #[error("planner output is not valid JSON: {0}")]
    Parse(String),

    /// JSON parsed but required fields are missing or have the wrong type.
    #[error("planner output violates schema: {0}")]
    Schema(String),

    /// The reasoning service could not be reached or refused the request.
    #[error("reasoning transport failed: {0}")]
    Transport(String),

    /// The client is missing credentials or was built with bad settings.
    #[error("reasoning client misconfigured: {0}")]
    Config(String),
}

impl PlannerError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable category label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerError::Parse(_) => "parse",
            PlannerError::Schema(_) => "schema",
            PlannerError::Transport(_) => "transport",
            PlannerError::Config(_) => "config",
        }
    }
}
