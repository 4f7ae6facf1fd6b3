//! Tool event normalization
//!
//! Pure transformations over raw tool inputs and outputs: bounded previews,
//! structural search for embedded payloads, and input sanitization. These
//! functions are total: malformed payloads degrade to absent fields, never
//! errors, so event delivery is never blocked by one tool's output.

use serde_json::{Map, Value};

/// Default truncation for output previews
const PREVIEW_LIMIT: usize = 220;
/// Truncation for sanitized tool inputs
const INPUT_LIMIT: usize = 180;
/// Maximum list elements kept by sanitization
const LIST_LIMIT: usize = 20;
/// Internal plumbing keys never shown to a client
const DENYLIST: &[&str] = &["runtime", "state", "messages"];

/// Bounded context extracted from a tool's output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    /// Truncated string form of the output
    pub output_preview: String,
    /// Raw screenshot payload, wherever it was nested
    pub screenshot: Option<String>,
    /// Page URL, wherever it was nested
    pub url: Option<String>,
}

/// Truncated string form of a value, `"..."`-suffixed past `limit`
pub fn clip_text(value: &Value, limit: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    clip_str(&text, limit)
}

fn clip_str(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let clipped: String = text.chars().take(limit).collect();
    format!("{}...", clipped)
}

/// Sanitize a tool input for display
///
/// Drops denylisted keys, truncates string leaves at 180 characters and
/// lists to their first 20 elements. Recursive and total; unrecognized
/// value types pass through unchanged.
pub fn sanitize_tool_input(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !DENYLIST.contains(&key.as_str()))
                .map(|(key, nested)| (key.clone(), sanitize_tool_input(nested)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(LIST_LIMIT)
                .map(sanitize_tool_input)
                .collect(),
        ),
        Value::String(text) => Value::String(clip_str(text, INPUT_LIMIT)),
        other => other.clone(),
    }
}

/// Depth-first search for the first non-null occurrence of `key`
pub fn find_nested<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                if !found.is_null() {
                    return Some(found);
                }
            }
            map.values().find_map(|nested| find_nested(nested, key))
        }
        Value::Array(items) => items.iter().find_map(|nested| find_nested(nested, key)),
        _ => None,
    }
}

/// Extract preview, screenshot, and url from an arbitrarily-shaped output
///
/// Tool output is often a text block containing a JSON document; one level
/// of embedded JSON is parsed and searched again. Parse failures are
/// treated as "not found".
pub fn extract_tool_context(output: &Value) -> ToolContext {
    let mut preview = clip_text(output, PREVIEW_LIMIT);
    let mut screenshot = find_nested(output, "screenshot").cloned();
    let mut url = find_nested(output, "url").cloned();

    if screenshot.is_none() {
        if let Some(text) = find_nested(output, "text").and_then(Value::as_str) {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                screenshot = find_nested(&parsed, "screenshot").cloned();
                if url.is_none() {
                    url = find_nested(&parsed, "url").cloned();
                }
                if let Some(obj) = parsed.as_object() {
                    let mut redacted = obj.clone();
                    if redacted.contains_key("screenshot") {
                        redacted.insert("screenshot".to_string(), Value::String("[omitted]".into()));
                    }
                    preview = clip_text(&Value::Object(redacted), PREVIEW_LIMIT);
                }
            }
        }
    }

    ToolContext {
        output_preview: preview,
        screenshot: screenshot.and_then(|v| v.as_str().map(String::from)),
        url: url.and_then(|v| v.as_str().map(String::from)),
    }
}
