//! Error types for the task store, gateway and HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use taskpilot_core_types::{CoreError, TaskId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} already exists")]
    Duplicate(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("invalid task id: {0}")]
    InvalidId(String),

    #[error("step sequence gap for task {task}: expected {expected}, got {got}")]
    SequenceGap { task: TaskId, expected: u32, got: u32 },

    #[error(transparent)]
    Lifecycle(#[from] CoreError),

    #[error("storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Io(format!("corrupt task document: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The remote engine could not be reached or refused the request.
    #[error("delegation to remote engine failed: {0}")]
    DelegationTransport(String),

    /// The executor for a task could not be created.
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Error returned by HTTP handlers as `{ "error": .. }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("task {id} not found")),
            StoreError::InvalidId(id) => ApiError::BadRequest(format!("invalid task id: {id}")),
            StoreError::Duplicate(id) => ApiError::BadRequest(format!("task {id} already exists")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidRequest(message) => ApiError::BadRequest(message),
            GatewayError::DelegationTransport(message) => {
                ApiError::BadGateway(format!("Orchestrator Error: {message}"))
            }
            GatewayError::ExecutorUnavailable(message) => ApiError::Unavailable(message),
            GatewayError::Store(err) => err.into(),
        }
    }
}
