//! Stream events carried from the host to the surface
//!
//! The wire form is `{"type": <tag>, "data": <payload>}`; `end` carries no
//! payload. Tool arguments and results are opaque JSON and pass through the
//! host untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The sole currency on the `stream-event` topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Text fragment for the current assistant bubble
    Content(String),
    /// The agent is invoking a skill
    ToolCall(ToolCallPayload),
    /// Result for an earlier call with the same id
    ToolResult(ToolResultPayload),
    /// The turn completed
    End,
    /// The turn failed; terminal
    Error(String),
}

impl StreamEvent {
    /// `end` and `error` close a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error(_))
    }

    /// Wire tag, used for logging and SSE event naming
    pub fn tag(&self) -> &'static str {
        match self {
            StreamEvent::Content(_) => "content",
            StreamEvent::ToolCall(_) => "toolCall",
            StreamEvent::ToolResult(_) => "toolResult",
            StreamEvent::End => "end",
            StreamEvent::Error(_) => "error",
        }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        StreamEvent::ToolCall(ToolCallPayload {
            tool: ToolCallInfo {
                id: id.into(),
                name: name.into(),
                arguments,
            },
        })
    }

    pub fn tool_result(id: impl Into<String>, result: Value) -> Self {
        StreamEvent::ToolResult(ToolResultPayload {
            tool: ToolRef { id: id.into() },
            result,
        })
    }
}

/// Payload of `toolCall`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool: ToolCallInfo,
}

/// Identity and input of a skill invocation
///
/// Fields default when absent on the wire; the surface substitutes a
/// generated id or a placeholder name for empty values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Payload of `toolResult`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool: ToolRef,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRef {
    #[serde(default)]
    pub id: String,
}
