//! Strict decoding of raw model output.

use serde_json::{Map, Value};

use crate::errors::PlannerError;
use crate::model::{Plan, PlanStep, StepDecision};

/// Remove markdown code fences around a payload.
///
/// Only the fence lines are dropped; the body is returned untouched so a
/// truncated object still fails to parse.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn decode_object(raw: &str) -> Result<Map<String, Value>, PlannerError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|err| PlannerError::parse(err.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PlannerError::schema(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_action(map: &Map<String, Value>, context: &str) -> Result<String, PlannerError> {
    match map.get("action") {
        Some(Value::String(action)) if !action.trim().is_empty() => Ok(action.trim().to_string()),
        Some(Value::String(_)) => Err(PlannerError::schema(format!("{context}: `action` is empty"))),
        Some(other) => Err(PlannerError::schema(format!(
            "{context}: `action` must be a string, got {}",
            type_name(other)
        ))),
        None => Err(PlannerError::schema(format!("{context}: missing `action`"))),
    }
}

fn required_params(map: &Map<String, Value>, context: &str) -> Result<Value, PlannerError> {
    map.get("params")
        .cloned()
        .ok_or_else(|| PlannerError::schema(format!("{context}: missing `params`")))
}

fn optional_text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Decode a plan-mode payload `{goal, steps: [{id, instruction, action, params}]}`.
///
/// `fallback_goal` is used when the payload omits `goal`. Steps without an
/// `id` are numbered by position starting at 1.
pub fn parse_plan(raw: &str, fallback_goal: &str) -> Result<Plan, PlannerError> {
    let map = decode_object(raw)?;
    let goal = map
        .get("goal")
        .and_then(Value::as_str)
        .filter(|goal| !goal.trim().is_empty())
        .unwrap_or(fallback_goal)
        .to_string();

    let steps = match map.get("steps") {
        Some(Value::Array(steps)) => steps,
        Some(other) => {
            return Err(PlannerError::schema(format!(
                "`steps` must be an array, got {}",
                type_name(other)
            )))
        }
        None => return Err(PlannerError::schema("missing `steps`")),
    };
    if steps.is_empty() {
        return Err(PlannerError::schema("plan contains no steps"));
    }

    let mut parsed = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let context = format!("step {}", index + 1);
        let Value::Object(step) = step else {
            return Err(PlannerError::schema(format!(
                "{context}: expected an object, got {}",
                type_name(step)
            )));
        };
        let id = match step.get("id") {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PlannerError::schema(format!("{context}: `id` out of range")))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| PlannerError::schema(format!("{context}: `id` is not numeric")))?,
            Some(Value::Null) | None => (index + 1) as u32,
            Some(other) => {
                return Err(PlannerError::schema(format!(
                    "{context}: `id` must be a number, got {}",
                    type_name(other)
                )))
            }
        };
        parsed.push(PlanStep {
            id,
            instruction: optional_text(step, "instruction"),
            action: required_action(step, &context)?,
            params: required_params(step, &context)?,
        });
    }

    Ok(Plan {
        goal,
        steps: parsed,
    })
}

/// Decode a step-mode payload `{thought, action, params, isDone}`.
///
/// `is_done` is accepted as a spelling of `isDone`; absent means not done.
pub fn parse_step_decision(raw: &str) -> Result<StepDecision, PlannerError> {
    let map = decode_object(raw)?;
    let is_done = match map.get("isDone").or_else(|| map.get("is_done")) {
        Some(Value::Bool(done)) => *done,
        Some(Value::Null) | None => false,
        Some(other) => {
            return Err(PlannerError::schema(format!(
                "`isDone` must be a boolean, got {}",
                type_name(other)
            )))
        }
    };
    Ok(StepDecision {
        thought: optional_text(&map, "thought"),
        action: required_action(&map, "decision")?,
        params: required_params(&map, "decision")?,
        is_done,
    })
}
