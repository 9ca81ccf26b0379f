//! In-process typed channel between host and surface
//!
//! One topic per direction: the surface sends `user-message` and
//! `close-window` to the host, the host sends `stream-event` back. The
//! channel is ordered and lossless for the lifetime of a session.

use crate::event::StreamEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

pub const USER_MESSAGE: &str = "user-message";
pub const STREAM_EVENT: &str = "stream-event";
pub const CLOSE_WINDOW: &str = "close-window";

/// Messages travelling from the surface to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum HostMessage {
    UserMessage(String),
    CloseWindow,
}

impl HostMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            HostMessage::UserMessage(_) => USER_MESSAGE,
            HostMessage::CloseWindow => CLOSE_WINDOW,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("surface is gone")]
    SurfaceClosed,
    #[error("host is gone")]
    HostClosed,
    #[error("no subscribers for {STREAM_EVENT}")]
    NoSubscribers,
    #[error("http transport failed: {0}")]
    Http(String),
}

/// Where the host delivers stream events
///
/// Implemented by the in-process channel and by the SSE fan-out.
pub trait SurfaceSink: Send + Sync {
    fn send(&self, event: StreamEvent) -> Result<(), TransportError>;

    /// True once the receiving surface has gone away for good.
    fn is_destroyed(&self) -> bool;
}

/// Sink backed by an unbounded mpsc; destroyed once the receiver is dropped
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl SurfaceSink for ChannelSink {
    fn send(&self, event: StreamEvent) -> Result<(), TransportError> {
        self.tx
            .send(event)
            .map_err(|_| TransportError::SurfaceClosed)
    }

    fn is_destroyed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Sink that fans events out to every connected SSE client
///
/// Never reports destroyed: clients come and go while the host window lives.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StreamEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }
}

impl SurfaceSink for BroadcastSink {
    fn send(&self, event: StreamEvent) -> Result<(), TransportError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers)
    }

    fn is_destroyed(&self) -> bool {
        false
    }
}

/// Host end of an in-process channel
pub struct HostPort {
    pub sink: ChannelSink,
    pub inbox: mpsc::UnboundedReceiver<HostMessage>,
}

/// Surface end of an in-process channel
pub struct SurfacePort {
    requests: mpsc::UnboundedSender<HostMessage>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl SurfacePort {
    pub fn send_user_message(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(HostMessage::UserMessage(text.into()))
    }

    pub fn close_window(&self) -> Result<(), TransportError> {
        self.send(HostMessage::CloseWindow)
    }

    fn send(&self, message: HostMessage) -> Result<(), TransportError> {
        tracing::debug!(topic = message.topic(), "Surface -> host");
        self.requests
            .send(message)
            .map_err(|_| TransportError::HostClosed)
    }

    /// Next stream event; `None` once the host side is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }
}

/// Create a connected host/surface pair
pub fn channel() -> (HostPort, SurfacePort) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    (
        HostPort {
            sink: ChannelSink { tx: event_tx },
            inbox: request_rx,
        },
        SurfacePort {
            requests: request_tx,
            events: event_rx,
        },
    )
}
