//! Message handler for the cross-context command/query surface.
//!
//! The extension's other contexts (popup, background) talk to the content
//! side through JSON messages carrying an `action` field. Every action
//! answers with a JSON object; nothing here returns an error to the
//! transport layer.

use serde_json::{json, Value};

use crate::services::highlight_session::HighlightSession;

/// Dispatches one inbound message to the session and builds the response.
///
/// Once the session is context-invalid every action answers with the same
/// failure payload; unknown actions answer `{success: false, error}`.
pub async fn handle_message(session: &HighlightSession, message: &Value) -> Value {
    let action = message
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if session.context_invalid() {
        return json!({"success": false, "error": "Extension context invalidated"});
    }

    match action {
        "updateHighlighting" => {
            session.refresh().await;
            json!({"success": true})
        }
        "clearHighlights" => {
            session.clear();
            json!({"success": true})
        }
        "getWordCounts" => {
            let words: Vec<String> = message
                .get("words")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.get("text").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let counts = session.word_counts(&words).await;
            json!({"success": true, "counts": counts})
        }
        "getPageWordCount" => {
            json!({"success": true, "wordCount": session.page_word_count().await})
        }
        "getSettings" => {
            let diagnostics = session.diagnostics().await;
            json!({
                "success": true,
                "settings": diagnostics.settings,
                "highlightedElementsCount": diagnostics.highlighted_elements,
                "contextInvalid": diagnostics.context_invalid,
            })
        }
        other => json!({"success": false, "error": format!("unknown action: {}", other)}),
    }
}
