//! Delimiter-based text framing.
//!
//! One JSON document per delimiter-terminated segment, newline by default.
//! With no delimiter configured the decoder instead treats the whole
//! accumulated buffer as a single document and retries silently until it
//! parses: without a delimiter, "incomplete" and "malformed" cannot be told
//! apart, so the byte budget is the only backstop for bad input.

use bytes::Bytes;
use serde_json::Value;
use tokio::time::Instant;
use tracing::warn;

use super::{DecodeContext, FrameDecoder};
use crate::{
    config::SocketConfig,
    error::{CodecError, DecodeError},
    event::SocketEvent,
};

/// The default segment delimiter.
pub const DEFAULT_DELIMITER: &str = "\n";

enum SegmentOutcome {
    Message(Value),
    Malformed {
        raw: String,
        source: serde_json::Error,
    },
}

/// Text framing decoder with partial-segment reassembly.
pub struct DelimitedTextDecoder {
    delimiter: Option<String>,
    buffer: String,
    created_at: Instant,
    last_append: Option<Instant>,
    last_message: Option<Instant>,
    max_buffer_bytes: usize,
    max_message_bytes: usize,
}

impl DelimitedTextDecoder {
    /// Create a newline-delimited decoder with the limits from `config`.
    #[must_use]
    pub fn new(config: &SocketConfig) -> Self {
        Self::with_delimiter(Some(DEFAULT_DELIMITER.to_owned()), config)
    }

    /// Create a decoder with a custom delimiter, or `None` for
    /// single-document mode.
    #[must_use]
    pub fn with_delimiter(delimiter: Option<String>, config: &SocketConfig) -> Self {
        Self {
            delimiter,
            buffer: String::new(),
            created_at: Instant::now(),
            last_append: None,
            last_message: None,
            max_buffer_bytes: config.max_buffer_bytes,
            max_message_bytes: config.effective_max_message_bytes(),
        }
    }

    /// When the decoder was created.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When data last arrived, if ever.
    #[must_use]
    pub fn last_append(&self) -> Option<Instant> {
        self.last_append
    }

    /// When a complete segment last arrived, if ever.
    #[must_use]
    pub fn last_message(&self) -> Option<Instant> {
        self.last_message
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Split the whole buffer on the delimiter and parse each complete
    /// segment, putting a trailing incomplete segment back.
    fn drain_segments(&mut self, delimiter: &str, outcomes: &mut Vec<SegmentOutcome>) {
        let buffer = std::mem::take(&mut self.buffer);
        let ends_on_delimiter = buffer.ends_with(delimiter);
        let mut segments: Vec<&str> = buffer.split(delimiter).collect();
        let incomplete = if ends_on_delimiter {
            // The final split element is the empty string after the
            // trailing delimiter; there is no partial segment.
            ""
        } else {
            segments.pop().unwrap_or("")
        };

        if !segments.is_empty() {
            self.last_message = Some(Instant::now());
        }
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            let segment = segment.trim();
            match serde_json::from_str::<Value>(segment) {
                Ok(message) => outcomes.push(SegmentOutcome::Message(message)),
                Err(source) => outcomes.push(SegmentOutcome::Malformed {
                    raw: segment.to_owned(),
                    source,
                }),
            }
        }
        self.buffer = incomplete.to_owned();
    }
}

impl FrameDecoder for DelimitedTextDecoder {
    fn encode(&self, message: &Value) -> Result<Bytes, CodecError> {
        let mut data = serde_json::to_string(message)?;
        if let Some(delimiter) = &self.delimiter {
            data.push_str(delimiter);
        }
        Ok(Bytes::from(data))
    }

    fn append(&mut self, chunk: &[u8], ctx: &mut DecodeContext<'_>) {
        if chunk.len() > self.max_message_bytes {
            warn!(
                chunk = chunk.len(),
                limit = self.max_message_bytes,
                "chunk exceeds message budget"
            );
            self.reset();
            ctx.emit(SocketEvent::Flood);
            return;
        }

        let added = String::from_utf8_lossy(chunk).into_owned();
        self.buffer.push_str(&added);
        self.last_append = Some(Instant::now());

        let mut outcomes = Vec::new();
        match self.delimiter.clone() {
            Some(delimiter) => {
                // Only a delimiter inside the newly added text can complete
                // a segment.
                if added.contains(&delimiter) {
                    self.drain_segments(&delimiter, &mut outcomes);
                }
            }
            None => {
                if let Ok(message) = serde_json::from_str::<Value>(&self.buffer) {
                    outcomes.push(SegmentOutcome::Message(message));
                    self.buffer.clear();
                }
                // Failure is retried on the next append, never reported.
            }
        }

        if self.buffer.len() > self.max_buffer_bytes {
            warn!(
                buffered = self.buffer.len(),
                limit = self.max_buffer_bytes,
                "receive buffer budget exceeded"
            );
            // This pass's parsed messages are dropped along with the buffer.
            self.reset();
            ctx.emit(SocketEvent::Flood);
            return;
        }

        let messages: Vec<Value> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                SegmentOutcome::Message(message) => Some(message.clone()),
                SegmentOutcome::Malformed { .. } => None,
            })
            .collect();
        if ctx.rate_limit_exceeded(messages.len()) {
            return;
        }
        ctx.emit(SocketEvent::Messages { messages });

        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Malformed { raw, source } => {
                    ctx.emit(SocketEvent::MalformedMessage {
                        message: None,
                        error: DecodeError::Parse { raw, source },
                    });
                }
                SegmentOutcome::Message(message) => {
                    if ctx.enforce_objects() && !message.is_object() {
                        ctx.emit(SocketEvent::MalformedMessage {
                            message: Some(message),
                            error: DecodeError::NotAnObject,
                        });
                    } else {
                        ctx.emit(SocketEvent::MessageIn { message });
                    }
                }
            }
        }
    }

    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
