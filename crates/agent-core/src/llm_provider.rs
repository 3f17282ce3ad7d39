use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::PlannerError;
use crate::model::{ActionFeedback, Plan, PlanStep, StepDecision};
use crate::parse::{parse_plan, parse_step_decision};
use crate::prompt;

/// Reasoning contract consumed by the engine.
///
/// Implementations keep no state between calls; everything the next decision
/// needs arrives through `history`.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Produce the full ordered plan for `goal` (plan mode).
    async fn plan(&self, goal: &str) -> Result<Plan, PlannerError>;

    /// Produce the next single action (step mode). `history` is `None` on
    /// the first call and the previous action's feedback afterwards.
    async fn decide(
        &self,
        goal: &str,
        history: Option<&ActionFeedback>,
    ) -> Result<StepDecision, PlannerError>;

    fn name(&self) -> &str {
        "reasoning"
    }
}

/// A chat-style model endpoint returning raw text for a system + user prompt.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, PlannerError>;

    fn name(&self) -> &str;
}

/// Reasoning client backed by any [`LlmBackend`].
#[derive(Clone)]
pub struct LlmReasoningClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmReasoningClient {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ReasoningClient for LlmReasoningClient {
    async fn plan(&self, goal: &str) -> Result<Plan, PlannerError> {
        let raw = self
            .backend
            .complete(&prompt::plan_system_prompt(), &prompt::plan_user_message(goal))
            .await?;
        debug!(backend = self.backend.name(), bytes = raw.len(), "received plan payload");
        parse_plan(&raw, goal).map_err(|err| {
            warn!(backend = self.backend.name(), error = %err, raw = %raw, "rejected plan payload");
            err
        })
    }

    async fn decide(
        &self,
        goal: &str,
        history: Option<&ActionFeedback>,
    ) -> Result<StepDecision, PlannerError> {
        let raw = self
            .backend
            .complete(
                &prompt::step_system_prompt(),
                &prompt::step_user_message(goal, history),
            )
            .await?;
        debug!(backend = self.backend.name(), bytes = raw.len(), "received step payload");
        parse_step_decision(&raw).map_err(|err| {
            warn!(backend = self.backend.name(), error = %err, raw = %raw, "rejected step payload");
            err
        })
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?://[^\s"'<>]+|(?:[a-z0-9-]+\.)+[a-z]{2,}(?:/[^\s"'<>]*)?)"#)
        .expect("url regex")
});

/// First URL-ish token in `goal`, with `https://` added when bare.
fn target_url(goal: &str) -> Option<String> {
    let found = URL_RE.find(goal)?.as_str();
    let found = found.trim_end_matches(['.', ',', ';', ')', '!', '?']);
    if found.contains("://") {
        Some(found.to_string())
    } else {
        Some(format!("https://{found}"))
    }
}

/// Deterministic client used for tests and offline runs.
///
/// Navigates to the first URL in the goal (when there is one) and then
/// extracts the page text.
#[derive(Debug, Default, Clone)]
pub struct MockReasoningClient;

fn ensure_goal(goal: &str) -> Result<(), PlannerError> {
    if goal.trim().is_empty() {
        return Err(PlannerError::schema("goal must not be empty"));
    }
    Ok(())
}

#[async_trait]
impl ReasoningClient for MockReasoningClient {
    async fn plan(&self, goal: &str) -> Result<Plan, PlannerError> {
        ensure_goal(goal)?;
        let mut steps = Vec::new();
        if let Some(url) = target_url(goal) {
            steps.push(PlanStep {
                id: 1,
                instruction: format!("Open {url}"),
                action: "navigate".to_string(),
                params: json!(url),
            });
        }
        steps.push(PlanStep {
            id: steps.len() as u32 + 1,
            instruction: "Extract the page text".to_string(),
            action: "extract".to_string(),
            params: json!({}),
        });
        Ok(Plan {
            goal: goal.to_string(),
            steps,
        })
    }

    async fn decide(
        &self,
        goal: &str,
        history: Option<&ActionFeedback>,
    ) -> Result<StepDecision, PlannerError> {
        ensure_goal(goal)?;
        let url = target_url(goal);
        let decision = match (history, url) {
            (None, Some(url)) => StepDecision {
                thought: format!("Mock: open {url} first"),
                action: "navigate".to_string(),
                params: json!(url),
                is_done: false,
            },
            _ => StepDecision {
                thought: "Mock: read the page and finish".to_string(),
                action: "extract".to_string(),
                params: json!({}),
                is_done: true,
            },
        };
        Ok(decision)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
