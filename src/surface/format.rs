//! Text shown for tool cards, results and errors

use serde_json::Value;

pub const UNKNOWN_TOOL: &str = "Unknown Tool";
pub const WAITING: &str = "⏳ Waiting for result...";

pub fn card_header(name: &str) -> String {
    format!("🔧 Skill Use: {name}")
}

pub fn arguments_line(arguments: &str) -> String {
    format!("Arguments: {arguments}")
}

pub fn result_line(result: &str) -> String {
    format!("✓ Result: {result}")
}

pub fn error_line(message: &str) -> String {
    format!("❌ Error: {message}")
}

/// Id for a call that arrived without one
pub fn fallback_tool_id(millis: i64) -> String {
    format!("tool-{millis}")
}

/// Compact JSON for structures, strings verbatim, `None` for null or "".
pub fn format_arguments(arguments: &Value) -> Option<String> {
    match arguments {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Two-space indented JSON for structures, strings verbatim, empty for null.
pub fn format_result(result: &Value) -> String {
    match result {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
        }
        other => other.to_string(),
    }
}
