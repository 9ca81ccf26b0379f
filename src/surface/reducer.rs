//! Pure reduction of surface actions into transcript mutations

use super::effect::{Action, Effect, COLLAPSE_AFTER};
use super::format;
use super::transcript::{InputLock, Node, ToolCard, Transcript};
use crate::event::{StreamEvent, ToolCallInfo, ToolResultPayload};

/// Apply one action, returning the effects the driver must run.
pub fn reduce(transcript: &mut Transcript, action: Action) -> Vec<Effect> {
    reduce_at(transcript, action, chrono::Utc::now().timestamp_millis())
}

/// [`reduce`] with an explicit clock, used for generated tool ids.
pub fn reduce_at(transcript: &mut Transcript, action: Action, now_millis: i64) -> Vec<Effect> {
    match action {
        Action::Submit(text) => submit(transcript, text),
        Action::Stream(event) => {
            if transcript.lock == InputLock::Idle {
                tracing::debug!(event = event.tag(), "Stream event outside a turn, ignored");
                return vec![];
            }
            stream_event(transcript, event, now_millis)
        }
        Action::ToggleCard(index) => match transcript.card_mut(index) {
            Some(card) => {
                card.collapsed = !card.collapsed;
                vec![]
            }
            None => vec![],
        },
        Action::CollapseDue(index) => {
            if let Some(card) = transcript.card_mut(index) {
                card.collapsed = true;
            }
            vec![]
        }
    }
}

fn submit(t: &mut Transcript, text: String) -> Vec<Effect> {
    let text = text.trim();
    if text.is_empty() || t.lock == InputLock::Awaiting {
        return vec![];
    }

    t.push(Node::User(text.to_string()));
    t.lock = InputLock::Awaiting;
    t.typing = true;
    vec![Effect::SendPrompt(text.to_string()), Effect::ScrollToBottom]
}

fn stream_event(t: &mut Transcript, event: StreamEvent, now_millis: i64) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);

    match event {
        StreamEvent::Content(fragment) => {
            t.typing = false;
            match t.open_bubble.and_then(|i| t.nodes.get_mut(i)) {
                Some(Node::Assistant(text)) => text.push_str(&fragment),
                _ => {
                    let index = t.push(Node::Assistant(fragment));
                    t.open_bubble = Some(index);
                }
            }
        }
        StreamEvent::ToolCall(payload) => {
            t.typing = false;
            t.open_bubble = None;
            let ToolCallInfo {
                id,
                name,
                arguments,
            } = payload.tool;

            let id = if id.is_empty() {
                unique_fallback_id(t, now_millis)
            } else {
                id
            };
            let name = if name.is_empty() {
                format::UNKNOWN_TOOL.to_string()
            } else {
                name
            };

            let index = t.push(Node::ToolCard(ToolCard {
                tool_id: id.clone(),
                name,
                arguments: format::format_arguments(&arguments),
                result: None,
                collapsed: false,
            }));
            if let Some(previous) = t.registry.insert(id.clone(), index) {
                tracing::debug!(tool_id = %id, previous, "Tool id reused, newer card wins");
            }
        }
        StreamEvent::ToolResult(ToolResultPayload { tool, result }) => {
            let text = format::format_result(&result);
            match t.registry.remove(&tool.id) {
                Some(index) => {
                    if let Some(card) = t.card_mut(index) {
                        card.result = Some(text);
                    }
                    effects.push(Effect::ScheduleCollapse {
                        card: index,
                        after: COLLAPSE_AFTER,
                    });
                }
                None => {
                    tracing::debug!(tool_id = %tool.id, "Result for unknown call, shown standalone");
                    t.push(Node::StandaloneResult(text));
                }
            }
        }
        StreamEvent::End => {
            finish_turn(t);
            effects.push(Effect::FocusInput);
        }
        StreamEvent::Error(message) => {
            t.typing = false;
            t.push(Node::Error(message));
            finish_turn(t);
            effects.push(Effect::FocusInput);
        }
    }

    effects.push(Effect::ScrollToBottom);
    effects
}

fn finish_turn(t: &mut Transcript) {
    t.typing = false;
    t.open_bubble = None;
    t.lock = InputLock::Idle;
}

fn unique_fallback_id(t: &Transcript, now_millis: i64) -> String {
    let base = format::fallback_tool_id(now_millis);
    if !t.registry.contains_key(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !t.registry.contains_key(candidate))
        .unwrap_or(base)
}
