//! Server-sent-events reader for HTTP responses that stream JSON-RPC frames
//! instead of returning a single JSON body.
//!
//! Events end at a blank line. Consecutive `data:` lines of one event are
//! joined with `\n`; comments and other fields are dropped.

use futures_util::StreamExt;
use rust_mcp_schema::schema_utils::ServerMessage;
use tracing::debug;

use crate::mcp::error::McpClientError;

#[derive(Default)]
pub struct SseEventBuffer {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseEventBuffer {
    /// Feeds a chunk and returns the data of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(strip_line_ending(&raw)).into_owned();
            events.extend(self.feed_line(&line));
        }
        events
    }

    /// Ends the stream, returning an event the server left unterminated.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(strip_line_ending(&tail)).into_owned();
        self.feed_line(&line).or_else(|| self.dispatch())
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Reads the stream until the first response or error frame.
/// Server requests and notifications in between are logged and skipped.
pub async fn next_sse_server_message(
    response: reqwest::Response,
) -> Result<ServerMessage, McpClientError> {
    let mut stream = response.bytes_stream();
    let mut events = SseEventBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(McpClientError::transport)?;
        for data in events.push(&chunk) {
            if let Some(message) = decode_sse_event(&data)? {
                return Ok(message);
            }
        }
    }

    if let Some(data) = events.finish() {
        if let Some(message) = decode_sse_event(&data)? {
            return Ok(message);
        }
    }

    Err(McpClientError::Protocol(
        "Empty event-stream response.".to_string(),
    ))
}

fn decode_sse_event(data: &str) -> Result<Option<ServerMessage>, McpClientError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let message = serde_json::from_str::<ServerMessage>(data)
        .map_err(|err| McpClientError::Protocol(err.to_string()))?;
    match message {
        ServerMessage::Response(_) | ServerMessage::Error(_) => Ok(Some(message)),
        other => {
            debug!(?other, "skipping server-initiated SSE frame");
            Ok(None)
        }
    }
}
