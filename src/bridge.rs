//! Host-side streaming bridge
//!
//! Owns one chat session per window and forwards the agent's events to the
//! surface as [`StreamEvent`]s. Every send is guarded against a destroyed
//! surface; once that is observed the agent stream is dropped.

use crate::agent::{Agent, AgentEvent, ChatSession};
use crate::event::StreamEvent;
use crate::ipc::{HostMessage, SurfaceSink, TransportError};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a call to [`ChatBridge::handle_message`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// `end` was delivered
    Completed,
    /// `error` was delivered
    Failed,
    /// The surface went away mid-turn; the agent stream was dropped
    SurfaceGone,
    NotInitialized,
}

impl From<AgentEvent> for StreamEvent {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::Content(text) => StreamEvent::Content(text),
            AgentEvent::ToolCall(call) => StreamEvent::tool_call(call.id, call.name, call.arguments),
            AgentEvent::ToolResult(result) => StreamEvent::tool_result(result.id, result.result),
            AgentEvent::End => StreamEvent::End,
            AgentEvent::Error(message) => StreamEvent::Error(message),
        }
    }
}

pub struct ChatBridge {
    agent: Arc<dyn Agent>,
    session: Option<Box<dyn ChatSession>>,
    surface: Option<Arc<dyn SurfaceSink>>,
}

impl ChatBridge {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            session: None,
            surface: None,
        }
    }

    /// Bind a surface and open the window's chat session.
    pub fn initialize(&mut self, surface: Arc<dyn SurfaceSink>) {
        if self.session.is_some() {
            tracing::warn!(agent = %self.agent.name(), "Bridge already initialized, ignoring");
            return;
        }
        self.session = Some(self.agent.chat());
        self.surface = Some(surface);
        tracing::info!(agent = %self.agent.name(), "Chat session opened");
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some() && self.surface.is_some()
    }

    /// Run one turn: prompt the agent and forward its events until the first
    /// terminal one.
    pub async fn handle_message(&mut self, text: &str) -> TurnOutcome {
        // Session and surface are bound and released together, so with no
        // session there is also nowhere to report the failure
        let (Some(surface), Some(session)) = (self.surface.clone(), self.session.as_mut()) else {
            tracing::warn!("Chat service not initialized, message dropped");
            return TurnOutcome::NotInitialized;
        };

        tracing::info!(chars = text.chars().count(), "Prompting agent");

        let mut stream = match session.stream(text).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(kind = ?e.kind, transient = e.kind.is_transient(), error = %e, "Agent stream failed to start");
                emit(surface.as_ref(), StreamEvent::Error(e.message));
                return TurnOutcome::Failed;
            }
        };

        while let Some(event) = stream.next().await {
            let event = StreamEvent::from(event);
            let outcome = match &event {
                StreamEvent::End => Some(TurnOutcome::Completed),
                StreamEvent::Error(message) => {
                    tracing::warn!(error = %message, "Agent reported an error");
                    Some(TurnOutcome::Failed)
                }
                _ => None,
            };

            if !emit(surface.as_ref(), event) {
                tracing::info!("Surface destroyed mid-turn, dropping agent stream");
                return TurnOutcome::SurfaceGone;
            }
            if let Some(outcome) = outcome {
                tracing::info!(?outcome, "Turn finished");
                return outcome;
            }
        }

        tracing::warn!("Agent stream closed without a terminal event");
        emit(
            surface.as_ref(),
            StreamEvent::Error("Agent stream ended unexpectedly".into()),
        );
        TurnOutcome::Failed
    }

    /// Drop the session and the surface handle. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.session.take().is_some() {
            tracing::info!(agent = %self.agent.name(), "Chat session closed");
        }
        self.surface = None;
    }

    /// Serve surface requests until `close-window` or the inbox closes.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<HostMessage>) {
        tracing::info!(agent = %self.agent.name(), "Bridge running");

        while let Some(message) = inbox.recv().await {
            match message {
                HostMessage::UserMessage(text) => {
                    let outcome = self.handle_message(&text).await;
                    tracing::debug!(?outcome, "Handled user message");
                }
                HostMessage::CloseWindow => {
                    tracing::info!("Close requested");
                    break;
                }
            }
        }

        self.destroy();
        tracing::info!("Bridge stopped");
    }
}

/// Deliver one event. Returns false once the surface is gone for good.
fn emit(surface: &dyn SurfaceSink, event: StreamEvent) -> bool {
    if surface.is_destroyed() {
        tracing::debug!(event = event.tag(), "Surface destroyed, event dropped");
        return false;
    }
    let tag = event.tag();
    match surface.send(event) {
        Ok(()) => true,
        Err(TransportError::SurfaceClosed) => {
            tracing::debug!(event = tag, "Surface closed, event dropped");
            false
        }
        Err(e) => {
            tracing::debug!(event = tag, error = %e, "Event not delivered");
            true
        }
    }
}
