//! MessagePack document codec.
//!
//! Wire format: each document is a 4-byte little-endian total length
//! (prefix included) followed by one MessagePack-encoded value. Values are
//! encoded with `to_vec_named` so maps keep their field names on the wire.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use super::{BinaryCodec, BulkDecode};
use crate::error::CodecError;

/// Width of the length prefix preceding each document.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// The default [`BinaryCodec`]: length-prefixed MessagePack documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgpackCodec;

impl BinaryCodec for MsgpackCodec {
    fn serialize(&self, message: &Value) -> Result<Bytes, CodecError> {
        let payload = rmp_serde::to_vec_named(message)?;
        let total = payload.len() + LENGTH_PREFIX_BYTES;
        let prefix =
            u32::try_from(total).map_err(|_| CodecError::PrefixOverflow { len: total })?;

        let mut out = BytesMut::with_capacity(total);
        out.put_u32_le(prefix);
        out.extend_from_slice(&payload);
        Ok(out.freeze())
    }

    fn deserialize_bulk(&self, buf: &[u8]) -> Result<BulkDecode, CodecError> {
        let mut decoded = BulkDecode::default();
        loop {
            let rest = &buf[decoded.bytes_consumed..];
            if rest.len() < LENGTH_PREFIX_BYTES {
                break;
            }
            let declared = read_document_len(rest);
            if declared < LENGTH_PREFIX_BYTES {
                return Err(CodecError::TruncatedPrefix(declared));
            }
            if rest.len() < declared {
                break;
            }
            let payload = &rest[LENGTH_PREFIX_BYTES..declared];
            let message: Value = rmp_serde::from_slice(payload)?;
            decoded.messages.push(message);
            decoded.bytes_consumed += declared;
        }
        Ok(decoded)
    }
}

/// Read a document's declared total length from its first four bytes.
///
/// # Panics
///
/// Panics if `buf` holds fewer than [`LENGTH_PREFIX_BYTES`] bytes.
#[must_use]
pub fn read_document_len(buf: &[u8]) -> usize {
    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    prefix.copy_from_slice(&buf[..LENGTH_PREFIX_BYTES]);
    u32::from_le_bytes(prefix) as usize
}
