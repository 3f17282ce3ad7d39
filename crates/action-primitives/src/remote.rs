//! HTTP client for an executor running in another process.
//!
//! Wire contract:
//! - `POST   {base}/v1/sessions` `{sessionId?}` -> `{sessionId}`
//! - `POST   {base}/v1/sessions/{id}/actions` `{action, params}` -> [`ExecuteActionResponse`]
//! - `DELETE {base}/v1/sessions/{id}`
//!
//! Every request carries the shared secret in `x-api-key` when configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{ActionResult, Observation};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ExecutorError;
use crate::executor::ActionExecutor;
use crate::types::ActionOutcome;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecuteActionRequest {
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// Body of the open call. A client-chosen id lets the client close a
/// session whose open response it never saw; reopening a live id is a no-op.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionResponse {
    pub session_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecuteActionResponse {
    pub success: bool,
    pub result: ActionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub observation: Observation,
}

impl From<ActionOutcome> for ExecuteActionResponse {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            success: outcome.result.success,
            error: outcome.result.error.clone(),
            result: outcome.result,
            observation: outcome.observation,
        }
    }
}

impl From<ExecuteActionResponse> for ActionOutcome {
    fn from(response: ExecuteActionResponse) -> Self {
        Self {
            result: response.result,
            observation: response.observation,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RemoteExecutorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request bound; should exceed the remote side's action bounds.
    pub timeout: Duration,
}

pub struct RemoteActionExecutor {
    client: Client,
    config: RemoteExecutorConfig,
    launched: bool,
    closed: bool,
    /// Picked before the open request goes out, so `close` can release it
    /// even when the open was cut short.
    session_id: Option<String>,
    opened: bool,
}

impl RemoteActionExecutor {
    pub fn new(config: RemoteExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ExecutorError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            config,
            launched: false,
            closed: false,
            session_id: None,
            opened: false,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ExecutorError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|err| ExecutorError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<response unavailable>".to_string());
        Err(ExecutorError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn ensure_session(&mut self) -> Result<String, ExecutorError> {
        let requested = self
            .session_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        if self.opened {
            return Ok(requested);
        }
        let body = OpenSessionRequest {
            session_id: Some(requested),
        };
        let response = self
            .send(self.client.post(self.url("/v1/sessions")).json(&body))
            .await?;
        let opened: OpenSessionResponse = response
            .json()
            .await
            .map_err(|err| ExecutorError::SessionStartup(format!("invalid session response: {err}")))?;
        debug!(session = %opened.session_id, "remote session opened");
        self.session_id = Some(opened.session_id.clone());
        self.opened = true;
        Ok(opened.session_id)
    }
}

#[async_trait]
impl ActionExecutor for RemoteActionExecutor {
    async fn launch(&mut self) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        self.launched = true;
        Ok(())
    }

    async fn execute(&mut self, action: &str, params: &Value) -> Result<ActionOutcome, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        if !self.launched {
            return Err(ExecutorError::NotLaunched);
        }
        let session_id = self.ensure_session().await?;
        let body = ExecuteActionRequest {
            action: action.to_string(),
            params: params.clone(),
        };
        let request = self
            .client
            .post(self.url(&format!("/v1/sessions/{session_id}/actions")))
            .json(&body);
        let response: ExecuteActionResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|err| ExecutorError::Transport(format!("invalid action response: {err}")))?;
        Ok(response.into())
    }

    async fn close(&mut self) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        self.closed = true;
        let opened = std::mem::take(&mut self.opened);
        if let Some(id) = self.session_id.take() {
            let request = self.client.delete(self.url(&format!("/v1/sessions/{id}")));
            match self.send(request).await {
                Ok(_) => {}
                // The open never reached the server.
                Err(ExecutorError::Remote { status: 404, .. }) if !opened => {}
                Err(err) => warn!(session = %id, error = %err, "failed to close remote session"),
            }
        }
        Ok(())
    }
}
