//! HTTP transport for a remote surface
//!
//! `POST /api/chat` and `POST /api/close` feed the bridge inbox; stream
//! events fan out to every `GET /api/stream` subscriber.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::ipc::{BroadcastSink, HostMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub requests: mpsc::UnboundedSender<HostMessage>,
    pub events: BroadcastSink,
    pub agent_name: Arc<str>,
}

impl AppState {
    pub fn new(
        requests: mpsc::UnboundedSender<HostMessage>,
        events: BroadcastSink,
        agent_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            requests,
            events,
            agent_name: agent_name.into(),
        }
    }
}
