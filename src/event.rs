//! Typed notifications raised by a connection.
//!
//! Rather than a generic publish/subscribe emitter, each connection owns one
//! unbounded channel of [`SocketEvent`]s. The channel preserves strict
//! per-connection ordering: events arrive exactly as the decode pass
//! produced them.

use std::io;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::DecodeError;

/// A notification raised by a [`crate::MessageSocket`].
#[derive(Debug)]
pub enum SocketEvent {
    /// Serialized data was handed to the writer. Carries both the wire bytes
    /// and the original message for observability.
    MessageOut {
        /// The message before serialization.
        message: Value,
        /// The serialized bytes queued for the transport.
        data: Bytes,
    },
    /// One or more messages were decoded from a single data pass, before any
    /// per-message validation.
    Messages {
        /// The full decoded batch, in arrival order.
        messages: Vec<Value>,
    },
    /// A single validated message was received.
    MessageIn {
        /// The decoded message.
        message: Value,
    },
    /// A message failed codec-level decoding or shape validation.
    MalformedMessage {
        /// The decoded value, when decoding got far enough to produce one.
        message: Option<Value>,
        /// Why the message was rejected.
        error: DecodeError,
    },
    /// A configured byte budget was exceeded.
    Flood,
    /// The transport reported closure.
    Disconnect,
    /// The transport reported a failure other than a benign peer reset.
    Error {
        /// The reported failure.
        error: io::Error,
    },
    /// More messages arrived within the rate window than the configured
    /// limit allows. The triggering batch was dropped without emission.
    RateLimitExceeded,
}

/// Sending half of a connection's event channel.
///
/// Dropping the receiver silently discards subsequent events; an owner that
/// stops listening has opted out of observation.
#[derive(Clone)]
pub(crate) struct EventSender(mpsc::UnboundedSender<SocketEvent>);

impl EventSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub(crate) fn emit(&self, event: SocketEvent) {
        let _ = self.0.send(event);
    }
}
