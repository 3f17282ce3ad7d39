//! Prompt templates for both reasoning modes.

use crate::model::ActionFeedback;

const ACTIONS: &str = r#"Available actions (action -> params):
- navigate -> "https://absolute.url"
- click -> "css selector" (text selectors like "text=Login" are allowed)
- type -> {"selector": "css selector", "text": "text to enter"}
- extract -> {} (returns visible page text)
- wait -> milliseconds as a number"#;

/// System prompt for plan mode.
pub fn plan_system_prompt() -> String {
    format!(
        r#"You are an autonomous browser agent planner.
Break the user's goal into a short, ordered sequence of browser actions.
Each step runs after the previous one finishes, so order matters.

{ACTIONS}

Respond with a single JSON object and nothing else:
{{"goal": "<goal>", "steps": [{{"id": 1, "instruction": "Navigate to Google", "action": "navigate", "params": "https://www.google.com"}}]}}"#
    )
}

/// System prompt for step mode.
pub fn step_system_prompt() -> String {
    format!(
        r#"You are an autonomous browser agent working one action at a time.
You receive the goal and the result of your previous action with the
current page URL and title. Choose exactly one next action.

{ACTIONS}

Respond with a single JSON object and nothing else:
{{"thought": "why this action", "action": "navigate", "params": "https://example.com", "isDone": false}}
Set "isDone" to true on the action that completes the goal."#
    )
}

pub fn plan_user_message(goal: &str) -> String {
    format!("Goal: \"{goal}\"")
}

pub fn step_user_message(goal: &str, history: Option<&ActionFeedback>) -> String {
    let mut message = format!("Goal: \"{goal}\"\n");
    match history {
        None => message.push_str("\nNo actions taken yet. The browser is on a blank page."),
        Some(feedback) => {
            message.push_str(&format!(
                "\nPrevious action: {} {}\n",
                feedback.action, feedback.params
            ));
            if feedback.result.success {
                message.push_str(&format!("Result: success - {}\n", feedback.result.summary));
            } else {
                let error = feedback.result.error.as_deref().unwrap_or("unknown error");
                message.push_str(&format!("Result: failed - {error}\n"));
            }
            if let Some(data) = &feedback.result.data {
                message.push_str(&format!("Data: {data}\n"));
            }
            message.push_str(&format!(
                "\nCurrent page:\n  URL: {}\n  Title: {}",
                feedback.observation.url, feedback.observation.title
            ));
        }
    }
    message
}
