//! End-to-end chat scenarios
//!
//! A scripted agent drives the real bridge over the in-process channel, and
//! every delivered event is folded through the surface reducer.

use crate::agent::{AgentEvent, ScriptedAgent};
use crate::bridge::{ChatBridge, TurnOutcome};
use crate::event::StreamEvent;
use crate::ipc::{self, HostMessage, SurfacePort};
use crate::surface::{format, reduce, Action, Effect, Node, Transcript, COLLAPSE_AFTER};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Harness {
    agent: ScriptedAgent,
    bridge: ChatBridge,
    surface: SurfacePort,
    transcript: Transcript,
    effects: Vec<Effect>,
    _inbox: mpsc::UnboundedReceiver<HostMessage>,
}

impl Harness {
    fn new() -> Self {
        let agent = ScriptedAgent::new();
        let (host, surface) = ipc::channel();
        let mut bridge = ChatBridge::new(Arc::new(agent.clone()));
        bridge.initialize(Arc::new(host.sink));
        Self {
            agent,
            bridge,
            surface,
            transcript: Transcript::new(),
            effects: Vec::new(),
            _inbox: host.inbox,
        }
    }

    /// Submit `text`, run the host turn, then apply what arrived.
    async fn turn(&mut self, text: &str, events: Vec<AgentEvent>) -> TurnOutcome {
        self.agent.queue_turn(events);
        self.effects = reduce(&mut self.transcript, Action::Submit(text.to_string()));
        assert_eq!(self.effects.first(), Some(&Effect::SendPrompt(text.to_string())));
        assert!(!self.transcript.input_enabled());

        let outcome = self.bridge.handle_message(text).await;
        while let Some(event) = self.surface.try_recv() {
            let effects = reduce(&mut self.transcript, Action::Stream(event));
            self.effects.extend(effects);
        }
        outcome
    }

    fn nodes(&self) -> &[Node] {
        self.transcript.nodes()
    }
}

fn s1_events() -> Vec<AgentEvent> {
    vec![
        AgentEvent::content("Hi "),
        AgentEvent::content("there."),
        AgentEvent::End,
    ]
}

fn s2_events() -> Vec<AgentEvent> {
    vec![
        AgentEvent::tool_call("t1", "Price", json!({"coin_id": "bitcoin"})),
        AgentEvent::tool_result("t1", json!({"usd": 60000})),
        AgentEvent::content("Bitcoin is $60000."),
        AgentEvent::End,
    ]
}

#[tokio::test]
async fn plain_reply() {
    let mut h = Harness::new();
    let outcome = h.turn("hello", s1_events()).await;

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        h.nodes(),
        &[
            Node::User("hello".into()),
            Node::Assistant("Hi there.".into())
        ]
    );
    assert!(h.transcript.input_enabled());
    assert!(h.effects.contains(&Effect::FocusInput));
}

#[tokio::test]
async fn single_tool_turn() {
    let mut h = Harness::new();
    h.turn("price of bitcoin", s2_events()).await;

    assert_eq!(h.nodes().len(), 3);
    assert_eq!(h.nodes()[0], Node::User("price of bitcoin".into()));
    let card = h.transcript.card(1).expect("tool card");
    assert_eq!(card.tool_id, "t1");
    assert_eq!(card.header(), "🔧 Skill Use: Price");
    assert_eq!(
        card.body(),
        vec![
            r#"Arguments: {"coin_id":"bitcoin"}"#.to_string(),
            "✓ Result: {\n  \"usd\": 60000\n}".to_string(),
        ]
    );
    assert_eq!(h.nodes()[2], Node::Assistant("Bitcoin is $60000.".into()));

    assert!(h.effects.contains(&Effect::ScheduleCollapse {
        card: 1,
        after: COLLAPSE_AFTER
    }));
    assert_eq!(COLLAPSE_AFTER.as_secs(), 3);
    assert!(!card.collapsed);
    reduce(&mut h.transcript, Action::CollapseDue(1));
    assert!(h.transcript.card(1).unwrap().collapsed);
    assert!(h.transcript.input_enabled());
}

#[tokio::test]
async fn interleaved_content_tool_content() {
    let mut h = Harness::new();
    h.turn(
        "eth?",
        vec![
            AgentEvent::content("Let me check. "),
            AgentEvent::tool_call("t2", "Price", json!({"coin_id": "eth"})),
            AgentEvent::tool_result("t2", json!("3000")),
            AgentEvent::content("ETH is $3000."),
            AgentEvent::End,
        ],
    )
    .await;

    assert_eq!(h.nodes()[1], Node::Assistant("Let me check. ".into()));
    let card = h.transcript.card(2).expect("tool card");
    assert_eq!(card.result.as_deref(), Some("3000"));
    assert_eq!(h.nodes()[3], Node::Assistant("ETH is $3000.".into()));
    assert_eq!(h.nodes().len(), 4);
}

#[tokio::test]
async fn mid_stream_error() {
    let mut h = Harness::new();
    let outcome = h
        .turn(
            "go",
            vec![
                AgentEvent::content("Working…"),
                AgentEvent::error("upstream timeout"),
                AgentEvent::content("never shown"),
                AgentEvent::End,
            ],
        )
        .await;

    assert_eq!(outcome, TurnOutcome::Failed);
    assert_eq!(
        h.nodes(),
        &[
            Node::User("go".into()),
            Node::Assistant("Working…".into()),
            Node::Error("upstream timeout".into()),
        ]
    );
    assert_eq!(format::error_line("upstream timeout"), "❌ Error: upstream timeout");
    assert!(h.transcript.input_enabled());

    // Stragglers for the finished turn change nothing
    let effects = reduce(
        &mut h.transcript,
        Action::Stream(StreamEvent::Content("late".into())),
    );
    assert!(effects.is_empty());
    assert_eq!(h.nodes().len(), 3);
}

#[tokio::test]
async fn orphan_tool_result() {
    let mut h = Harness::new();
    h.turn(
        "what?",
        vec![AgentEvent::tool_result("t3", json!("42")), AgentEvent::End],
    )
    .await;

    assert_eq!(h.nodes()[1], Node::StandaloneResult("42".into()));
    assert_eq!(format::result_line("42"), "✓ Result: 42");
    assert!(h.transcript.input_enabled());
}

#[tokio::test]
async fn back_to_back_turns() {
    let mut h = Harness::new();
    assert_eq!(h.turn("hello", s1_events()).await, TurnOutcome::Completed);
    assert_eq!(
        h.turn("price of bitcoin", s2_events()).await,
        TurnOutcome::Completed
    );

    assert_eq!(h.nodes().len(), 5);
    assert_eq!(h.nodes()[1], Node::Assistant("Hi there.".into()));
    let card = h.transcript.card(3).expect("second turn card");
    assert_eq!(card.result.as_deref(), Some("{\n  \"usd\": 60000\n}"));
    assert_eq!(h.nodes()[4], Node::Assistant("Bitcoin is $60000.".into()));
    assert_eq!(h.transcript.registered_count(), 0);
    assert!(h.transcript.input_enabled());

    assert_eq!(h.agent.sessions_opened(), 1);
    assert_eq!(h.agent.recorded_prompts(), vec!["hello", "price of bitcoin"]);
}

#[tokio::test]
async fn call_left_waiting_on_end() {
    let mut h = Harness::new();
    h.turn(
        "slow",
        vec![
            AgentEvent::tool_call("t9", "Price", json!({"coin_id": "doge"})),
            AgentEvent::End,
        ],
    )
    .await;

    let card = h.transcript.card(1).expect("tool card");
    assert!(card.is_waiting());
    assert_eq!(card.body().last().map(String::as_str), Some(format::WAITING));
    assert!(h.transcript.is_registered("t9"));
    assert!(h.transcript.input_enabled());
}

#[tokio::test]
async fn start_failure_unlocks_input() {
    let mut h = Harness::new();
    h.agent
        .queue_start_failure(crate::agent::AgentError::auth("ANTHROPIC_API_KEY is not set"));
    reduce(&mut h.transcript, Action::Submit("hi".into()));
    h.bridge.handle_message("hi").await;
    while let Some(event) = h.surface.try_recv() {
        reduce(&mut h.transcript, Action::Stream(event));
    }

    assert_eq!(
        h.nodes().last(),
        Some(&Node::Error("ANTHROPIC_API_KEY is not set".into()))
    );
    assert!(h.transcript.input_enabled());
}
