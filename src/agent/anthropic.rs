//! Anthropic-backed agent with a skill loop
//!
//! Each prompt opens a streaming Messages API request. Text deltas are
//! forwarded as they arrive; when the model asks for skills, each one is
//! announced, run, and its result reported before the conversation is sent
//! back for the next round. The turn ends when a round finishes without
//! skill use.

use super::{Agent, AgentError, AgentEvent, AgentStream, ChatSession};
use crate::skills::{SkillContext, SkillRegistry};
use crate::sse::SseParser;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Static description of an agent
#[derive(Debug, Clone)]
pub struct LlmAgentConfig {
    pub name: String,
    /// System prompt
    pub behavior: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: String,
    pub max_tokens: u32,
    /// Upper bound on request rounds within one turn
    pub max_rounds: usize,
}

impl LlmAgentConfig {
    /// The crypto price tracker shipped with the app
    pub fn crypto_assistant(api_key: Option<String>, api_url: String, model: String) -> Self {
        Self {
            name: "CryptoMarket Assistant".to_string(),
            behavior: "You are a crypto price tracker. You are given a coin id and you need to get the price of the coin in USD".to_string(),
            model,
            api_key,
            api_url,
            max_tokens: 4096,
            max_rounds: 8,
        }
    }
}

struct Shared {
    config: LlmAgentConfig,
    http: Client,
    skills: SkillRegistry,
}

/// Agent talking to the Anthropic Messages API
pub struct LlmAgent {
    shared: Arc<Shared>,
}

impl LlmAgent {
    pub fn new(config: LlmAgentConfig, skills: SkillRegistry) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::unknown(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            agent = %config.name,
            model = %config.model,
            skills = ?skills.names(),
            "Agent configured"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                http,
                skills,
            }),
        })
    }
}

impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.shared.config.name
    }

    fn chat(&self) -> Box<dyn ChatSession> {
        Box::new(LlmChat {
            shared: Arc::clone(&self.shared),
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

/// One chat with in-memory history
struct LlmChat {
    shared: Arc<Shared>,
    /// Completed turns only; a failed turn leaves no trace
    history: Arc<Mutex<Vec<ApiMessage>>>,
}

#[async_trait]
impl ChatSession for LlmChat {
    async fn stream(&mut self, prompt: &str) -> Result<AgentStream, AgentError> {
        let mut messages = self
            .history
            .lock()
            .map_err(|_| AgentError::unknown("chat history poisoned"))?
            .clone();
        messages.push(ApiMessage::user(vec![ApiContentBlock::Text {
            text: prompt.to_string(),
        }]));

        let response = self.shared.open_round(&messages).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            shared.drive_turn(messages, response, tx, history).await;
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

impl Shared {
    /// Start one streaming request; errors here mean the round never began.
    async fn open_round(&self, messages: &[ApiMessage]) -> Result<reqwest::Response, AgentError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AgentError::auth("ANTHROPIC_API_KEY is not set"))?;

        let request = build_request(&self.config, &self.skills, messages);
        let response = self
            .http
            .post(&self.config.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn drive_turn(
        &self,
        mut messages: Vec<ApiMessage>,
        first: reqwest::Response,
        tx: mpsc::UnboundedSender<AgentEvent>,
        history: Arc<Mutex<Vec<ApiMessage>>>,
    ) {
        let ctx = SkillContext::new(self.config.name.clone(), self.http.clone());
        let mut response = first;

        for round in 1..=self.config.max_rounds {
            let outcome = match read_round(response.bytes_stream(), &tx).await {
                Ok(RoundResult::Finished(outcome)) => outcome,
                Ok(RoundResult::Abandoned) => {
                    tracing::debug!(round, "Stream consumer gone, abandoning turn");
                    return;
                }
                Err(e) => {
                    tracing::warn!(round, kind = ?e.kind, error = %e, "Round failed");
                    send(&tx, AgentEvent::error(e.message));
                    return;
                }
            };

            let tool_uses = outcome.tool_uses();
            tracing::debug!(
                round,
                stop_reason = ?outcome.stop_reason,
                tool_uses = tool_uses.len(),
                "Round finished"
            );
            if tool_uses.is_empty() {
                // The API rejects empty assistant turns, so an empty reply
                // leaves history as it was
                if outcome.content.is_empty() {
                    tracing::debug!(round, "Empty reply, history unchanged");
                } else if let Ok(mut committed) = history.lock() {
                    messages.push(ApiMessage::assistant(outcome.content));
                    *committed = messages;
                }
                send(&tx, AgentEvent::End);
                return;
            }
            messages.push(ApiMessage::assistant(outcome.content));

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                if tx
                    .send(AgentEvent::tool_call(&id, &name, input.clone()))
                    .is_err()
                {
                    tracing::debug!(round, tool = %name, "Stream consumer gone, turn abandoned");
                    return;
                }
                let output = self.skills.execute(&name, input, ctx.clone()).await;
                if tx
                    .send(AgentEvent::tool_result(&id, output.value.clone()))
                    .is_err()
                {
                    tracing::debug!(round, tool = %name, "Stream consumer gone, turn abandoned");
                    return;
                }
                results.push(ApiContentBlock::ToolResult {
                    tool_use_id: id,
                    content: output.to_model_text(),
                    is_error: output.is_error,
                });
            }
            messages.push(ApiMessage::user(results));

            response = match self.open_round(&messages).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(round, kind = ?e.kind, error = %e, "Follow-up request failed");
                    send(&tx, AgentEvent::error(e.message));
                    return;
                }
            };
        }

        send(
            &tx,
            AgentEvent::error(format!(
                "Skill loop exceeded {} rounds",
                self.config.max_rounds
            )),
        );
    }
}

/// Terminal events only; a closed receiver means the bridge already stopped.
fn send(tx: &mpsc::UnboundedSender<AgentEvent>, event: AgentEvent) {
    if let Err(e) = tx.send(event) {
        tracing::debug!(event = ?e.0, "Stream consumer gone, event dropped");
    }
}

fn build_request<'a>(
    config: &'a LlmAgentConfig,
    skills: &SkillRegistry,
    messages: &'a [ApiMessage],
) -> ApiRequest<'a> {
    let tools: Vec<ApiTool> = skills
        .definitions()
        .into_iter()
        .map(|d| ApiTool {
            name: d.name,
            description: d.description,
            input_schema: d.input_schema,
        })
        .collect();

    ApiRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        system: &config.behavior,
        messages,
        tools: if tools.is_empty() { None } else { Some(tools) },
        stream: true,
    }
}

// ============================================================================
// Stream accumulation
// ============================================================================

enum RoundResult {
    Finished(RoundOutcome),
    /// The event receiver was dropped mid-round
    Abandoned,
}

#[derive(Debug, Default)]
struct RoundOutcome {
    content: Vec<ApiContentBlock>,
    stop_reason: Option<String>,
}

impl RoundOutcome {
    fn tool_uses(&self) -> Vec<(String, String, Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ApiContentBlock::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

enum BlockState {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
        partial_json: String,
    },
}

impl BlockState {
    fn finish(self) -> Option<ApiContentBlock> {
        match self {
            BlockState::Text(text) if text.is_empty() => None,
            BlockState::Text(text) => Some(ApiContentBlock::Text { text }),
            BlockState::ToolUse {
                id,
                name,
                input,
                partial_json,
            } => {
                let input = if partial_json.trim().is_empty() {
                    if input.is_null() {
                        Value::Object(serde_json::Map::new())
                    } else {
                        input
                    }
                } else {
                    serde_json::from_str(&partial_json).unwrap_or(Value::String(partial_json))
                };
                Some(ApiContentBlock::ToolUse { id, name, input })
            }
        }
    }
}

/// Consume one streamed response, forwarding text deltas as they arrive.
async fn read_round<S, B, E>(
    bytes: S,
    tx: &mpsc::UnboundedSender<AgentEvent>,
) -> Result<RoundResult, AgentError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut bytes = std::pin::pin!(bytes);
    let mut parser = SseParser::new();
    let mut blocks: BTreeMap<usize, BlockState> = BTreeMap::new();
    let mut stop_reason = None;

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| AgentError::network(format!("Stream interrupted: {e}")))?;

        for frame in parser.push(chunk.as_ref()) {
            let event: ApiStreamEvent = match serde_json::from_str(&frame.data) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        event_type = frame.event.as_deref().unwrap_or("<none>"),
                        error = %e,
                        "Skipping unparseable stream frame"
                    );
                    continue;
                }
            };

            match event {
                ApiStreamEvent::ContentBlockStart {
                    index,
                    content_block,
                } => {
                    let state = match content_block {
                        ApiStartBlock::Text { text } => {
                            if !text.is_empty() && tx.send(AgentEvent::content(&text)).is_err() {
                                return Ok(RoundResult::Abandoned);
                            }
                            BlockState::Text(text)
                        }
                        ApiStartBlock::ToolUse { id, name, input } => BlockState::ToolUse {
                            id,
                            name,
                            input,
                            partial_json: String::new(),
                        },
                        ApiStartBlock::Other => continue,
                    };
                    blocks.insert(index, state);
                }
                ApiStreamEvent::ContentBlockDelta { index, delta } => {
                    match (blocks.get_mut(&index), delta) {
                        (Some(BlockState::Text(text)), ApiDelta::TextDelta { text: fragment }) => {
                            text.push_str(&fragment);
                            if tx.send(AgentEvent::Content(fragment)).is_err() {
                                return Ok(RoundResult::Abandoned);
                            }
                        }
                        (
                            Some(BlockState::ToolUse { partial_json, .. }),
                            ApiDelta::InputJsonDelta {
                                partial_json: fragment,
                            },
                        ) => partial_json.push_str(&fragment),
                        _ => {}
                    }
                }
                ApiStreamEvent::MessageDelta { delta } => {
                    if delta.stop_reason.is_some() {
                        stop_reason = delta.stop_reason;
                    }
                }
                ApiStreamEvent::MessageStop => {
                    let content = blocks.into_values().filter_map(BlockState::finish).collect();
                    return Ok(RoundResult::Finished(RoundOutcome {
                        content,
                        stop_reason,
                    }));
                }
                ApiStreamEvent::Error { error } => {
                    return Err(match error.r#type.as_str() {
                        "overloaded_error" | "api_error" => AgentError::server_error(error.message),
                        "rate_limit_error" => AgentError::rate_limit(error.message),
                        _ => AgentError::unknown(error.message),
                    });
                }
                ApiStreamEvent::MessageStart
                | ApiStreamEvent::ContentBlockStop { .. }
                | ApiStreamEvent::Ping
                | ApiStreamEvent::Unknown => {}
            }
        }
    }

    Err(AgentError::protocol("Model stream ended before message_stop"))
}

// ============================================================================
// Anthropic API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContentBlock>,
}

impl ApiMessage {
    fn user(content: Vec<ApiContentBlock>) -> Self {
        Self {
            role: "user",
            content,
        }
    }

    fn assistant(content: Vec<ApiContentBlock>) -> Self {
        Self {
            role: "assistant",
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiStreamEvent {
    MessageStart,
    ContentBlockStart {
        index: usize,
        content_block: ApiStartBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ApiDelta,
    },
    ContentBlockStop {
        #[allow(dead_code)]
        index: usize,
    },
    MessageDelta {
        delta: ApiMessageDelta,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiStartBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    message: String,
}
