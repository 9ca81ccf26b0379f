//! Incremental Server-Sent Events framing
//!
//! Used for both directions of HTTP streaming: reading the model provider's
//! response and reading the host's `stream-event` feed.

use std::borrow::Cow;

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Buffers raw bytes and yields complete frames
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// Comment lines (keep-alives) and frames without data are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // Frames are split on bytes so a character cut across chunks survives
        self.buffer.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet terminated by a blank line
    pub fn pending(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}
