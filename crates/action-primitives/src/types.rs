//! Core data types for the action executor

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core_types::{ActionResult, Observation};

use crate::errors::ActionError;

/// Action kinds the executor implements.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Extract,
    Wait,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Extract => "extract",
            ActionKind::Wait => "wait",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    /// Case-insensitive; `goto` is accepted for `navigate`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" | "goto" => Ok(ActionKind::Navigate),
            "click" => Ok(ActionKind::Click),
            "type" => Ok(ActionKind::Type),
            "extract" => Ok(ActionKind::Extract),
            "wait" => Ok(ActionKind::Wait),
            _ => Err(ActionError::UnsupportedAction(s.trim().to_string())),
        }
    }
}

/// A browser action with parameters normalized to one shape per kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserAction {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    Extract,
    Wait { ms: u64 },
}

impl BrowserAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            BrowserAction::Navigate { .. } => ActionKind::Navigate,
            BrowserAction::Click { .. } => ActionKind::Click,
            BrowserAction::Type { .. } => ActionKind::Type,
            BrowserAction::Extract => ActionKind::Extract,
            BrowserAction::Wait { .. } => ActionKind::Wait,
        }
    }

    /// Normalize a raw `(action, params)` pair.
    ///
    /// Accepted shapes:
    /// - navigate: `"url"` or `{"url": ..}`
    /// - click: `"selector"` or `{"selector": ..}`
    /// - type: `{"selector", "text"}` or `[selector, text]`
    /// - extract: `null`, `{}` or `""`
    /// - wait: a non-negative number, `{"ms": n}`, or `null` for `default_wait_ms`
    ///
    /// Anything else is rejected rather than guessed at.
    pub fn normalize(action: &str, params: &Value, default_wait_ms: u64) -> Result<Self, ActionError> {
        let kind: ActionKind = action.parse()?;
        match kind {
            ActionKind::Navigate => {
                let url = string_or_field(params, "url")
                    .ok_or_else(|| ActionError::invalid("navigate", "expected a URL string"))?;
                Ok(BrowserAction::Navigate {
                    url: validate_url(url)?,
                })
            }
            ActionKind::Click => {
                let selector = string_or_field(params, "selector")
                    .ok_or_else(|| ActionError::invalid("click", "expected a selector string"))?;
                Ok(BrowserAction::Click {
                    selector: non_empty("click", "selector", selector)?,
                })
            }
            ActionKind::Type => {
                let (selector, text) = match params {
                    Value::Object(map) => (
                        map.get("selector").and_then(Value::as_str),
                        map.get("text").and_then(Value::as_str),
                    ),
                    Value::Array(items) if items.len() == 2 => {
                        (items[0].as_str(), items[1].as_str())
                    }
                    _ => {
                        return Err(ActionError::invalid(
                            "type",
                            "expected {selector, text} or [selector, text]",
                        ))
                    }
                };
                let selector = selector
                    .ok_or_else(|| ActionError::invalid("type", "missing selector"))?;
                let text = text
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| ActionError::invalid("type", "missing text"))?;
                Ok(BrowserAction::Type {
                    selector: non_empty("type", "selector", selector)?,
                    text: text.to_string(),
                })
            }
            ActionKind::Extract => match params {
                Value::Null => Ok(BrowserAction::Extract),
                Value::Object(map) if map.is_empty() => Ok(BrowserAction::Extract),
                Value::String(s) if s.is_empty() => Ok(BrowserAction::Extract),
                _ => Err(ActionError::invalid("extract", "takes no parameters")),
            },
            ActionKind::Wait => {
                let ms = match params {
                    Value::Null => Some(default_wait_ms),
                    Value::Number(n) => wait_millis(n),
                    Value::Object(map) => match map.get("ms") {
                        Some(Value::Number(n)) => wait_millis(n),
                        None | Some(Value::Null) => Some(default_wait_ms),
                        _ => None,
                    },
                    _ => None,
                };
                let ms = ms.ok_or_else(|| {
                    ActionError::invalid("wait", "expected a non-negative number of milliseconds")
                })?;
                Ok(BrowserAction::Wait { ms })
            }
        }
    }
}

fn string_or_field<'a>(params: &'a Value, field: &str) -> Option<&'a str> {
    match params {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    }
}

fn non_empty(action: &str, field: &str, value: &str) -> Result<String, ActionError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ActionError::invalid(action, format!("empty {field}")));
    }
    Ok(value.to_string())
}

fn wait_millis(n: &serde_json::Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    })
}

fn validate_url(raw: &str) -> Result<String, ActionError> {
    let raw = raw.trim();
    let parsed = url::Url::parse(raw)
        .map_err(|err| ActionError::invalid("navigate", format!("invalid URL {raw:?}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" | "file" | "about" => Ok(raw.to_string()),
        other => Err(ActionError::invalid(
            "navigate",
            format!("unsupported URL scheme: {other}"),
        )),
    }
}

/// Bounds applied by the local executor.
#[derive(Clone, Debug)]
pub struct ExecutorSettings {
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub extract_max_chars: usize,
    pub default_wait_ms: u64,
    /// Waits longer than this are clamped so `wait` never fails.
    pub max_wait_ms: u64,
    pub capture_screenshots: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(5),
            extract_max_chars: 5000,
            default_wait_ms: 1000,
            max_wait_ms: 30_000,
            capture_screenshots: false,
        }
    }
}

/// What `execute` hands back: the action's result plus a fresh observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub result: ActionResult,
    pub observation: Observation,
}
