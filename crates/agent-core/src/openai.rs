//! OpenAI-compatible chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::PlannerError;
use crate::llm_provider::LlmBackend;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Tried in order; a 429 on one key falls through to the next.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, PlannerError> {
        if config.api_keys.iter().all(|key| key.trim().is_empty()) {
            return Err(PlannerError::config("missing OpenAI API key"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PlannerError::config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, PlannerError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let keys: Vec<&String> = self
            .config
            .api_keys
            .iter()
            .filter(|key| !key.trim().is_empty())
            .collect();
        let mut last_error = None;
        for (index, key) in keys.iter().enumerate() {
            let response = match self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    last_error = Some(PlannerError::transport(format!(
                        "openai request failed: {err}"
                    )));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < keys.len() {
                    warn!(
                        target: "openai",
                        attempt = index + 1,
                        remaining = keys.len() - index - 1,
                        "OpenAI rate limited request; switching API key"
                    );
                    last_error = Some(PlannerError::transport(format!("openai returned {status}")));
                    continue;
                }
                return Err(PlannerError::transport(format!(
                    "openai returned {status}: {text}"
                )));
            }

            let response: ChatCompletionResponse = response.json().await.map_err(|err| {
                PlannerError::transport(format!("openai response invalid: {err}"))
            })?;
            return response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| PlannerError::transport("openai response missing content"));
        }

        Err(last_error
            .unwrap_or_else(|| PlannerError::transport("OpenAI request exhausted all API keys")))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
