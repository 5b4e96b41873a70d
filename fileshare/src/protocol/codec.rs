// (c) 2026 fileshare contributors

//! Primitive field encodings
//!
//! Every message in the catalog is built by composing the implementations here.
//! This module knows nothing about opcodes.

use std::future::Future;

use bytes::{BufMut as _, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt as _};

use super::WireMessage;

/// Largest string (in bytes) we will decode
pub const MAX_STRING_LEN: usize = 64 * 1024;
/// Largest file I/O payload (in bytes) we will decode
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;
/// Largest number of items in a sequence we will decode
pub const MAX_SEQUENCE_LEN: usize = 1_048_576;

/// A varint carries 7 bits per byte; a `u32` needs at most 5 bytes
const VARINT_MAX_BYTES: usize = 5;

/// A malformed or truncated message.
///
/// These are fatal to the connection: there is no way to find the start of the next message.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream ended part way through a message
    #[error("stream ended part way through a message")]
    Truncated,
    /// The header named an operation we do not know
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    /// A boolean field held something other than 0 or 1
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    /// A string field was not valid UTF-8
    #[error("string is not valid UTF-8")]
    BadUtf8(#[from] std::string::FromUtf8Error),
    /// A string length prefix did not fit in 32 bits
    #[error("string length prefix overflows 32 bits")]
    VarintOverflow,
    /// A payload or sequence length was negative
    #[error("negative length {0}")]
    NegativeLength(i32),
    /// A length was larger than we are prepared to accept
    #[error("{what} length {len} exceeds the limit of {limit}")]
    TooLarge {
        /// The kind of field
        what: &'static str,
        /// The declared length
        len: usize,
        /// Our limit for this kind of field
        limit: usize,
    },
    /// The underlying stream failed
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for WireError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

/// Converts an in-memory length to its wire form.
///
/// Senders keep every length within the decode limits, all of which fit in an `i32`.
fn wire_len(len: usize) -> i32 {
    debug_assert!(i32::try_from(len).is_ok(), "length {len} does not fit on the wire");
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Reads a length field, enforcing sign and limit
async fn read_len<R>(reader: &mut R, what: &'static str, limit: usize) -> Result<usize, WireError>
where
    R: AsyncRead + Unpin + Send,
{
    let raw = reader.read_i32_le().await?;
    let len = usize::try_from(raw).map_err(|_| WireError::NegativeLength(raw))?;
    if len > limit {
        return Err(WireError::TooLarge { what, len, limit });
    }
    Ok(len)
}

#[allow(clippy::cast_possible_truncation)] // masked to 7 bits
fn put_varint(buf: &mut BytesMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

async fn read_varint<R>(reader: &mut R) -> Result<u32, WireError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut value = 0u32;
    for i in 0..VARINT_MAX_BYTES {
        let byte = reader.read_u8().await?;
        // The fifth byte may only carry the top 4 bits, and may not continue
        if i == VARINT_MAX_BYTES - 1 && byte > 0x0f {
            return Err(WireError::VarintOverflow);
        }
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(WireError::VarintOverflow)
}

impl WireMessage for bool {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(u8::from(*self));
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            match reader.read_u8().await? {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(WireError::InvalidBool(other)),
            }
        }
    }
}

impl WireMessage for i32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(*self);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move { Ok(reader.read_i32_le().await?) }
    }
}

impl WireMessage for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move { Ok(reader.read_u32_le().await?) }
    }
}

impl WireMessage for i64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(*self);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move { Ok(reader.read_i64_le().await?) }
    }
}

impl WireMessage for String {
    fn encode(&self, buf: &mut BytesMut) {
        debug_assert!(self.len() <= MAX_STRING_LEN, "string too long for the wire");
        put_varint(buf, u32::try_from(self.len()).unwrap_or(u32::MAX));
        buf.put_slice(self.as_bytes());
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            let len = usize::try_from(read_varint(reader).await?).unwrap_or(usize::MAX);
            if len > MAX_STRING_LEN {
                return Err(WireError::TooLarge {
                    what: "string",
                    len,
                    limit: MAX_STRING_LEN,
                });
            }
            let mut raw = vec![0u8; len];
            let _ = reader.read_exact(&mut raw).await?;
            Ok(String::from_utf8(raw)?)
        }
    }
}

/// File I/O payloads: an `int32` byte count, then the bytes
impl WireMessage for Bytes {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(wire_len(self.len()));
        buf.put_slice(self);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            let len = read_len(reader, "payload", MAX_PAYLOAD_LEN).await?;
            let mut raw = BytesMut::zeroed(len);
            let _ = reader.read_exact(&mut raw).await?;
            Ok(raw.freeze())
        }
    }
}

/// Sequences: an `int32` item count, then the items
impl<T: WireMessage> WireMessage for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(wire_len(self.len()));
        for item in self {
            item.encode(buf);
        }
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            let count = read_len(reader, "sequence", MAX_SEQUENCE_LEN).await?;
            // Don't trust the count for the allocation; the items may never arrive
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(T::decode(reader).await?);
            }
            Ok(items)
        }
    }
}
