//! Agent abstraction consumed by the bridge
//!
//! An agent hands out chat sessions; a session turns a prompt into a stream
//! of [`AgentEvent`]s. The bridge assumes nothing beyond these five events.

mod anthropic;
mod error;
#[cfg(test)]
mod scripted;

pub use anthropic::{LlmAgent, LlmAgentConfig, DEFAULT_API_URL, DEFAULT_MODEL};
pub use error::{AgentError, AgentErrorKind};
#[cfg(test)]
pub use scripted::ScriptedAgent;

use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Events emitted by an agent while answering one prompt
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Content(String),
    ToolCall(AgentToolCall),
    ToolResult(AgentToolResult),
    End,
    Error(String),
}

impl AgentEvent {
    pub fn content(text: impl Into<String>) -> Self {
        AgentEvent::Content(text.into())
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        AgentEvent::ToolCall(AgentToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        })
    }

    pub fn tool_result(id: impl Into<String>, result: Value) -> Self {
        AgentEvent::ToolResult(AgentToolResult {
            id: id.into(),
            result,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        AgentEvent::Error(message.into())
    }
}

/// A skill invocation as reported by the agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentToolCall {
    pub id: String,
    pub name: String,
    /// Structured or string-shaped; never interpreted on the host
    pub arguments: Value,
}

/// A skill result as reported by the agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentToolResult {
    pub id: String,
    pub result: Value,
}

/// Stream handle returned for one prompt
pub type AgentStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// A preconfigured agent able to open chat sessions
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Open a new chat session. Sessions carry their own history.
    fn chat(&self) -> Box<dyn ChatSession>;
}

/// One conversation with an agent
#[async_trait]
pub trait ChatSession: Send {
    /// Submit `prompt` as the next user turn and return its event stream.
    ///
    /// An `Err` means the stream never started.
    async fn stream(&mut self, prompt: &str) -> Result<AgentStream, AgentError>;
}
