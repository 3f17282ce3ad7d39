//! Shared-secret authentication for the `/v1` routes.

use std::sync::Arc;

use action_primitives::API_KEY_HEADER;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::errors::ApiError;

#[derive(Clone, Debug, Default)]
pub struct ApiKeyPolicy {
    api_key: Option<String>,
}

impl ApiKeyPolicy {
    /// An empty or missing key leaves the routes open.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn allows(&self, provided: Option<&str>) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => provided.map(str::trim) == Some(expected.as_str()),
        }
    }
}

pub async fn api_key_middleware(
    State(policy): State<Arc<ApiKeyPolicy>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if policy.allows(provided) {
        Ok(next.run(req).await)
    } else {
        debug!(path = %req.uri().path(), "rejected request with missing or wrong api key");
        Err(ApiError::Unauthorized)
    }
}
