//! Binary document codec consumed by the length-prefixed framing.
//!
//! The framing state machine treats the codec as a black box: it hands the
//! whole pending buffer to [`BinaryCodec::deserialize_bulk`], which consumes
//! every complete document present and reports how many bytes it took. A
//! trailing partial document is not an error; it simply stays buffered.

pub mod msgpack;

pub use msgpack::MsgpackCodec;

use bytes::Bytes;
use serde_json::Value;

use crate::error::CodecError;

/// Result of a bulk decode pass over a pending buffer.
#[derive(Debug, Default)]
pub struct BulkDecode {
    /// Every complete document decoded, in stream order.
    pub messages: Vec<Value>,
    /// Bytes consumed from the front of the buffer.
    pub bytes_consumed: usize,
}

/// Serializes single messages and bulk-decodes document streams.
pub trait BinaryCodec: Send + Sync {
    /// Serialize one message into a self-delimiting wire document.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the value cannot be encoded or the
    /// resulting document does not fit the wire format's length prefix.
    fn serialize(&self, message: &Value) -> Result<Bytes, CodecError>;

    /// Decode every complete document at the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] only when a complete document fails to
    /// decode; the remaining buffer is then considered unrecoverable by the
    /// caller. Incomplete trailing data is reported through
    /// [`BulkDecode::bytes_consumed`], not as an error.
    fn deserialize_bulk(&self, buf: &[u8]) -> Result<BulkDecode, CodecError>;
}
