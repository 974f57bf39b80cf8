//! Length-prefixed binary framing.
//!
//! Every document on the wire opens with a 4-byte little-endian total
//! length, so the decoder can check budgets before any decode work. The
//! expected length of the next document is cached across chunks to avoid
//! re-reading the prefix on every append.

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tracing::{debug, warn};

use super::{DecodeContext, FrameDecoder};
use crate::{
    codec::{
        BinaryCodec, BulkDecode,
        msgpack::{LENGTH_PREFIX_BYTES, read_document_len},
    },
    config::SocketConfig,
    error::{CodecError, DecodeError},
    event::SocketEvent,
};

/// Binary framing decoder with partial-buffer reassembly.
pub struct LengthPrefixedDecoder {
    codec: Box<dyn BinaryCodec>,
    buffer: BytesMut,
    /// Cached declared length of the next document; `None` until a prefix
    /// has been read.
    next_len: Option<usize>,
    max_buffer_bytes: usize,
    max_message_bytes: usize,
}

impl LengthPrefixedDecoder {
    /// Create a decoder using `codec` with the limits from `config`.
    #[must_use]
    pub fn new(codec: Box<dyn BinaryCodec>, config: &SocketConfig) -> Self {
        // Size the buffer for one and a half messages when a message cap is
        // configured, otherwise for the full buffer budget.
        let initial_capacity = config
            .max_message_bytes
            .map_or(config.max_buffer_bytes, |m| m + m / 2);
        Self {
            codec,
            buffer: BytesMut::with_capacity(initial_capacity),
            next_len: None,
            max_buffer_bytes: config.max_buffer_bytes,
            max_message_bytes: config.effective_max_message_bytes(),
        }
    }

    /// Allocated capacity of the pending buffer.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl FrameDecoder for LengthPrefixedDecoder {
    fn encode(&self, message: &Value) -> Result<Bytes, CodecError> {
        self.codec.serialize(message)
    }

    fn append(&mut self, chunk: &[u8], ctx: &mut DecodeContext<'_>) {
        if self.buffer.len() + chunk.len() > self.max_buffer_bytes {
            warn!(
                buffered = self.buffer.len(),
                chunk = chunk.len(),
                limit = self.max_buffer_bytes,
                "receive buffer budget exceeded"
            );
            // The chunk is rejected; existing buffered bytes stay intact.
            ctx.emit(SocketEvent::Flood);
            return;
        }
        self.buffer.extend_from_slice(chunk);

        if self.next_len.is_none() {
            if self.buffer.len() < LENGTH_PREFIX_BYTES {
                return;
            }
            let declared = read_document_len(&self.buffer);
            self.next_len = Some(declared);
            if declared > self.max_message_bytes {
                warn!(
                    declared,
                    limit = self.max_message_bytes,
                    "declared message length exceeds budget"
                );
                ctx.emit(SocketEvent::Flood);
                return;
            }
        }

        let Some(expected) = self.next_len else {
            return;
        };
        if self.buffer.len() < expected {
            return;
        }
        self.next_len = None;

        match self.codec.deserialize_bulk(&self.buffer) {
            Err(error) => {
                // The remaining bytes are unrecoverable.
                self.buffer.clear();
                ctx.emit(SocketEvent::MalformedMessage {
                    message: None,
                    error: DecodeError::Codec(error),
                });
            }
            Ok(BulkDecode {
                messages,
                bytes_consumed,
            }) => {
                let _ = self.buffer.split_to(bytes_consumed);
                if messages.is_empty() {
                    return;
                }
                if ctx.rate_limit_exceeded(messages.len()) {
                    return;
                }
                debug!(count = messages.len(), "decoded message batch");
                ctx.emit(SocketEvent::Messages {
                    messages: messages.clone(),
                });
                for message in messages {
                    if ctx.enforce_objects() && !message.is_object() {
                        ctx.emit(SocketEvent::MalformedMessage {
                            message: Some(message),
                            error: DecodeError::NotAnObject,
                        });
                        // Fail fast: the rest of the batch is dropped.
                        return;
                    }
                    ctx.emit(SocketEvent::MessageIn { message });
                }
            }
        }
    }

    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
