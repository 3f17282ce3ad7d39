//! Reasoning client for the TaskPilot engine.
//!
//! Turns a goal (and, in step mode, the latest observation) into either an
//! upfront [`Plan`] or a single [`StepDecision`]. Model output is parsed
//! strictly: wrapping fences are stripped, anything else malformed is an
//! error rather than a guess.

pub mod errors;
pub mod gemini;
pub mod llm_provider;
pub mod model;
pub mod openai;
pub mod parse;
pub mod prompt;

pub use errors::PlannerError;
pub use gemini::{GeminiBackend, GeminiConfig};
pub use llm_provider::{LlmBackend, LlmReasoningClient, MockReasoningClient, ReasoningClient};
pub use model::{ActionFeedback, Plan, PlanStep, StepDecision};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use parse::{parse_plan, parse_step_decision, strip_code_fence};
