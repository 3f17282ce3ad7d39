//! Configuration for the task execution engine.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the engine obtains actions from the reasoning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// One reasoning call returns the whole plan; steps run in order.
    #[default]
    Plan,
    /// One reasoning call per step, fed the previous observation.
    Step,
}

impl EngineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineMode::Plan => "plan",
            EngineMode::Step => "step",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(EngineMode::Plan),
            "step" => Ok(EngineMode::Step),
            other => Err(format!("unknown engine mode: {other}")),
        }
    }
}

/// What happens after a step reports `success: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the task on the first failed step.
    #[default]
    FailFast,
    /// Record the failure and keep going within the step budget.
    Continue,
}

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default: plan
    pub mode: EngineMode,

    /// Upper bound on executed steps per task, in both modes.
    /// Default: 10
    pub max_steps: u32,

    /// Bound on a single executor call in milliseconds.
    /// Default: 60000
    pub step_timeout_ms: u64,

    /// Bound on a single reasoning call in milliseconds.
    /// Default: 60000
    pub reasoning_timeout_ms: u64,

    /// Default: fail_fast
    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::Plan,
            max_steps: 10,
            step_timeout_ms: 60_000,
            reasoning_timeout_ms: 60_000,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl EngineConfig {
    /// Step mode with default bounds.
    pub fn stepwise() -> Self {
        Self {
            mode: EngineMode::Step,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: EngineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_timeout_ms)
    }
}
