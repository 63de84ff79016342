//! What the relay sends back to its caller, and how it is framed on the wire.

use bytes::Bytes;
use clap::ValueEnum;
use serde_json::json;

use crate::error::RelayError;

/// A unit of output forwarded to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Thread id the client should send with its next turn
    Session { thread_id: String },

    /// A fragment of the assistant reply
    Text(String),
}

/// Framing of the client response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StreamFormat {
    /// `{"thread_id":"..."}\n` followed by raw, unframed text fragments
    #[default]
    Legacy,

    /// One JSON record per line: `{"kind":"session"|"text"|"error","value":...}`
    Tagged,
}

impl StreamFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Legacy => "text/plain; charset=utf-8",
            Self::Tagged => "application/x-ndjson",
        }
    }
}

impl ClientEvent {
    /// Encode as one body chunk
    pub fn encode(&self, format: StreamFormat) -> Bytes {
        match (format, self) {
            (StreamFormat::Legacy, Self::Session { thread_id }) => {
                json_line(&json!({ "thread_id": thread_id }))
            }
            (StreamFormat::Legacy, Self::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
            (StreamFormat::Tagged, Self::Session { thread_id }) => {
                json_line(&json!({ "kind": "session", "value": thread_id }))
            }
            (StreamFormat::Tagged, Self::Text(text)) => {
                json_line(&json!({ "kind": "text", "value": text }))
            }
        }
    }
}

/// Last chunk of a stream that failed after the response status was sent
///
/// Legacy streams get the same `{"error": {...}}` object a failed request
/// would have returned, appended after the text already written.
pub fn error_chunk(error: &RelayError, format: StreamFormat) -> Bytes {
    match format {
        StreamFormat::Legacy => Bytes::from(json!({ "error": error.detail() }).to_string()),
        StreamFormat::Tagged => json_line(&json!({
            "kind": "error",
            "value": error.to_string(),
            "type": error.kind(),
        })),
    }
}

fn json_line(value: &serde_json::Value) -> Bytes {
    let mut line = value.to_string();
    line.push('\n');
    Bytes::from(line)
}
