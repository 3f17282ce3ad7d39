//! Extract primitive

use serde_json::json;
use taskpilot_core_types::ActionResult;

use super::bounded;
use crate::errors::ActionError;
use crate::session::BrowserSession;
use crate::types::ExecutorSettings;

pub(crate) async fn execute_extract(
    session: &mut dyn BrowserSession,
    settings: &ExecutorSettings,
) -> Result<ActionResult, ActionError> {
    let text = bounded(
        settings.navigation_timeout,
        "text extraction",
        session.page_text(),
    )
    .await
    .map_err(|err| ActionError::Extraction(err.to_string()))?;

    let (text, truncated) = truncate_chars(&text, settings.extract_max_chars);
    Ok(ActionResult::ok("Extracted page content").with_data(json!({
        "text": text,
        "truncated": truncated,
    })))
}

/// Truncate on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn truncates_multibyte_text_on_char_boundary() {
        let (out, truncated) = truncate_chars("héllo wörld", 4);
        assert_eq!(out, "héll");
        assert!(truncated);
        let (out, truncated) = truncate_chars("short", 10);
        assert_eq!(out, "short");
        assert!(!truncated);
    }
}
