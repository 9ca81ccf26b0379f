//! Server-Sent Events carrying the `stream-event` topic

use crate::event::StreamEvent;
use crate::ipc::STREAM_EVENT;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a broadcast subscription into an SSE response
pub fn sse_stream(
    broadcast_rx: broadcast::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => to_sse_event(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged, events dropped");
            None
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_sse_event(event: &StreamEvent) -> Option<Event> {
    match Event::default().event(STREAM_EVENT).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(event = event.tag(), error = %e, "Failed to encode stream event");
            None
        }
    }
}
