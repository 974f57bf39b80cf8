//! Framing strategies turning raw chunks into messages.
//!
//! A [`FrameDecoder`] owns the partial-message state of one connection and
//! is driven by [`crate::MessageSocket`] through [`FrameDecoder::append`].
//! The socket hands each call a [`DecodeContext`] exposing the two
//! cross-cutting services the strategies share: event emission and the
//! message rate check. The strategy is chosen at connection construction;
//! nothing downstream branches on it.

pub mod delimited;
pub mod length_prefixed;

pub use delimited::DelimitedTextDecoder;
pub use length_prefixed::LengthPrefixedDecoder;

use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::CodecError,
    event::{EventSender, SocketEvent},
    rate::RateState,
};

/// Services granted to a decoder for the duration of one data pass.
pub struct DecodeContext<'a> {
    pub(crate) events: &'a EventSender,
    pub(crate) rate: &'a mut RateState,
    pub(crate) enforce_objects: bool,
}

impl DecodeContext<'_> {
    /// Raise an event on the connection's channel.
    pub fn emit(&self, event: SocketEvent) {
        self.events.emit(event);
    }

    /// Whether decoded messages must be JSON objects.
    #[must_use]
    pub fn enforce_objects(&self) -> bool {
        self.enforce_objects
    }

    /// Record `count` decoded messages against the rate window and report
    /// whether the configured limit is now exceeded.
    ///
    /// On true a [`SocketEvent::RateLimitExceeded`] has been emitted and the
    /// caller must drop the batch without emitting its messages.
    pub fn rate_limit_exceeded(&mut self, count: usize) -> bool {
        if self.rate.record_and_check(count) {
            warn!(count, "message rate limit exceeded");
            self.events.emit(SocketEvent::RateLimitExceeded);
            return true;
        }
        false
    }
}

/// A framing strategy: stateful chunk reassembly plus a companion encoder.
pub trait FrameDecoder: Send {
    /// Serialize one outbound message in this framing's wire format.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the message cannot be serialized.
    fn encode(&self, message: &Value) -> Result<Bytes, CodecError>;

    /// Consume one inbound chunk, emitting any decoded messages and decode
    /// failures through `ctx`. Never fails; all outcomes are events.
    fn append(&mut self, chunk: &[u8], ctx: &mut DecodeContext<'_>);

    /// Bytes currently buffered awaiting a complete message.
    fn buffered_len(&self) -> usize;
}
