//! Scripted agent for tests
//!
//! Replays queued turns in order across every session it opens, and records
//! the prompts it was given.

use super::{Agent, AgentError, AgentEvent, AgentStream, ChatSession};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

enum ScriptedTurn {
    Events(Vec<AgentEvent>),
    StartFailure(AgentError),
    /// Events are pushed by the test while the bridge is consuming
    Live(mpsc::UnboundedReceiver<AgentEvent>),
}

#[derive(Default)]
struct Script {
    turns: VecDeque<ScriptedTurn>,
    prompts: Vec<String>,
    sessions_opened: usize,
}

/// Agent that returns queued responses
#[derive(Clone, Default)]
pub struct ScriptedAgent {
    script: Arc<Mutex<Script>>,
}

#[allow(dead_code)]
impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn that streams `events` in order
    pub fn queue_turn(&self, events: Vec<AgentEvent>) {
        self.script
            .lock()
            .unwrap()
            .turns
            .push_back(ScriptedTurn::Events(events));
    }

    /// Queue a turn whose stream fails to start
    pub fn queue_start_failure(&self, error: AgentError) {
        self.script
            .lock()
            .unwrap()
            .turns
            .push_back(ScriptedTurn::StartFailure(error));
    }

    /// Queue a turn driven by the returned sender
    pub fn queue_live_turn(&self) -> mpsc::UnboundedSender<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .unwrap()
            .turns
            .push_back(ScriptedTurn::Live(rx));
        tx
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.script.lock().unwrap().prompts.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.script.lock().unwrap().sessions_opened
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &'static str {
        "Scripted Assistant"
    }

    fn chat(&self) -> Box<dyn ChatSession> {
        self.script.lock().unwrap().sessions_opened += 1;
        Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
        })
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn stream(&mut self, prompt: &str) -> Result<AgentStream, AgentError> {
        let turn = {
            let mut script = self.script.lock().unwrap();
            script.prompts.push(prompt.to_string());
            script.turns.pop_front()
        };

        match turn {
            Some(ScriptedTurn::Events(events)) => Ok(Box::pin(futures::stream::iter(events))),
            Some(ScriptedTurn::Live(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(ScriptedTurn::StartFailure(error)) => Err(error),
            None => Err(AgentError::unknown("No scripted turn queued")),
        }
    }
}
