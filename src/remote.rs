//! Surface-side client for a host started with `serve`
//!
//! Presents a remote host as an ordinary [`SurfacePort`]: host-bound messages
//! become POSTs, and the SSE feed is parsed back into stream events.

use crate::api::{AgentInfoResponse, ChatRequest, ErrorResponse};
use crate::event::StreamEvent;
use crate::ipc::{self, ChannelSink, HostMessage, SurfacePort, SurfaceSink, TransportError, STREAM_EVENT};
use crate::sse::SseParser;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;

/// A connected remote host
pub struct RemoteHost {
    pub agent_name: String,
    pub port: SurfacePort,
}

/// Subscribe to the host's stream, then start forwarding in both directions.
pub async fn connect(base_url: &str) -> Result<RemoteHost, TransportError> {
    let base = base_url.trim_end_matches('/').to_string();
    let http = Client::new();

    let agent_name = http
        .get(format!("{base}/api/agent"))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_error)?
        .json::<AgentInfoResponse>()
        .await
        .map_err(http_error)?
        .name;

    let stream = http
        .get(format!("{base}/api/stream"))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_error)?;

    tracing::info!(host = %base, agent = %agent_name, "Connected to remote host");

    let (host, port) = ipc::channel();
    let (failures_tx, failures_rx) = mpsc::unbounded_channel();
    tokio::spawn(pump_events(stream, host.sink, failures_rx));
    tokio::spawn(pump_requests(http, base, host.inbox, failures_tx));

    Ok(RemoteHost { agent_name, port })
}

fn http_error(e: reqwest::Error) -> TransportError {
    TransportError::Http(e.to_string())
}

/// SSE feed and local delivery failures -> surface.
///
/// Holds the only sink, so the surface port closes once the feed ends.
async fn pump_events(
    response: reqwest::Response,
    sink: ChannelSink,
    mut failures: mpsc::UnboundedReceiver<String>,
) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();

    loop {
        tokio::select! {
            chunk = body.next() => {
                let chunk = match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Stream feed interrupted");
                        break;
                    }
                    None => break,
                };
                for frame in parser.push(&chunk) {
                    if frame.event.as_deref() != Some(STREAM_EVENT) {
                        continue;
                    }
                    let event: StreamEvent = match serde_json::from_str(&frame.data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping malformed stream event");
                            continue;
                        }
                    };
                    if sink.send(event).is_err() {
                        tracing::debug!("Surface gone, stopping stream feed");
                        return;
                    }
                }
            }
            Some(message) = failures.recv() => {
                // The host will never answer, so close the turn locally
                if sink.send(StreamEvent::Error(message)).is_err() {
                    tracing::debug!("Surface gone, stopping stream feed");
                    return;
                }
            }
        }
    }
    tracing::info!("Stream feed closed");
}

/// Surface -> host requests, serially.
async fn pump_requests(
    http: Client,
    base: String,
    mut inbox: mpsc::UnboundedReceiver<HostMessage>,
    failures: mpsc::UnboundedSender<String>,
) {
    while let Some(message) = inbox.recv().await {
        match message {
            HostMessage::UserMessage(text) => {
                if let Err(message) = post_chat(&http, &base, text).await {
                    tracing::warn!(error = %message, "Prompt not delivered");
                    if failures.send(message).is_err() {
                        tracing::debug!("Stream feed already closed, failure not shown");
                    }
                }
            }
            HostMessage::CloseWindow => {
                if let Err(e) = http.post(format!("{base}/api/close")).send().await {
                    tracing::debug!(error = %e, "Close not delivered");
                }
                break;
            }
        }
    }
}

async fn post_chat(http: &Client, base: &str, text: String) -> Result<(), String> {
    let response = http
        .post(format!("{base}/api/chat"))
        .json(&ChatRequest { text })
        .send()
        .await
        .map_err(|e| format!("Could not reach the chat host: {e}"))?;

    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let message = response
        .json::<ErrorResponse>()
        .await
        .map_or_else(|_| format!("Chat host returned HTTP {status}"), |body| body.error);
    Err(message)
}
