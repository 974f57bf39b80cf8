//! Error types for configuration, codecs, and the socket surface.
//!
//! Floods and rate-limit trips are deliberately not errors: they are policy
//! signals delivered as [`crate::SocketEvent`]s so the connection's owner
//! decides whether to keep or drop the connection.

use thiserror::Error;

/// Errors returned when building a [`crate::SocketConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The message rate limit was zero; omit it to disable rate limiting.
    #[error("rate limit must be at least 1 message per window")]
    ZeroRateLimit,
    /// The rate-limit window was zero.
    #[error("rate limit window must be non-zero")]
    ZeroRateWindow,
    /// The receive-buffer byte budget was zero.
    #[error("max buffered bytes must be non-zero")]
    ZeroBufferLimit,
    /// The single-message byte budget was zero; omit it to fall back to the
    /// buffer budget.
    #[error("max message bytes must be non-zero")]
    ZeroMessageLimit,
    /// Delayed writes were enabled without a write delay.
    #[error("write delay must be non-zero when delayed writes are enabled")]
    ZeroWriteDelay,
}

/// Errors produced by the binary document codec.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value could not be encoded to the wire format.
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// Bytes inside a complete document could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    /// A value could not be serialized as a JSON document.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// A message serialized to more bytes than the length prefix can carry.
    #[error("message of {len} bytes exceeds the u32 length prefix")]
    PrefixOverflow {
        /// Total document length that failed to fit.
        len: usize,
    },
    /// A document declared a total length shorter than the prefix itself.
    #[error("declared document length {0} is shorter than the length prefix")]
    TruncatedPrefix(usize),
}

/// Reason a received message was reported as malformed.
///
/// Carried inside [`crate::SocketEvent::MalformedMessage`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A delimited text segment failed to parse as a JSON document.
    #[error("failed to parse message: {source}")]
    Parse {
        /// The offending segment text.
        raw: String,
        /// The underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// The binary stream contained data the codec could not decode. The
    /// decoder clears its whole buffer when this is reported.
    #[error("failed to decode message stream: {0}")]
    Codec(#[from] CodecError),
    /// Object-shape enforcement rejected a decoded value.
    #[error("message is not an object")]
    NotAnObject,
}

/// Errors returned by [`crate::MessageSocket`] operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SocketError {
    /// `send` requires a JSON object; other value types are rejected before
    /// serialization.
    #[error("message must be a JSON object")]
    NotAnObject,
    /// The active framing's encoder failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
