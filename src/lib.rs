//! Public API for the `framesock` library.
//!
//! This crate provides a framing layer for ordered byte-stream connections:
//! it reassembles arbitrarily chunked inbound bytes into discrete, validated
//! messages, frames outbound messages, and shields the owning process from
//! floods (oversized buffers or messages) and excessive message rates.
//!
//! Two framing strategies are provided: a length-prefixed binary codec and a
//! delimiter-based text codec. Both are driven through [`MessageSocket`],
//! which reports everything observable through a typed [`SocketEvent`]
//! stream consumed by the connection's owner.

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod framing;
pub mod rate;
pub mod socket;
pub mod transport;
pub mod writer;

pub use codec::{BinaryCodec, BulkDecode, MsgpackCodec};
pub use config::{SocketConfig, SocketConfigBuilder};
pub use error::{CodecError, ConfigError, DecodeError, SocketError};
pub use event::SocketEvent;
pub use framing::{DecodeContext, DelimitedTextDecoder, FrameDecoder, LengthPrefixedDecoder};
pub use rate::RateWindow;
pub use socket::MessageSocket;
pub use transport::{TcpTransport, Transport, TransportEvent};
pub use writer::SocketWriter;
