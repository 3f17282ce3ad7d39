use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{ActionResult, Observation};

/// Upfront plan. Immutable once produced; steps run in the order given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub instruction: String,
    pub action: String,
    pub params: Value,
}

/// Single next action produced in step mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDecision {
    pub thought: String,
    pub action: String,
    pub params: Value,
    pub is_done: bool,
}

/// What the previous step did, fed back to the next reasoning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFeedback {
    pub action: String,
    pub params: Value,
    pub result: ActionResult,
    pub observation: Observation,
}
