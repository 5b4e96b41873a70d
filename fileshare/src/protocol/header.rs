// (c) 2026 fileshare contributors

//! Request header and opcodes

use std::future::Future;

use bytes::{BufMut as _, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt as _};

use super::{WireError, WireMessage};

/// Selects which request/response pair a message belongs to.
///
/// This is a closed set; adding to it is a protocol change.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::FromRepr, strum::EnumIter,
)]
#[repr(u8)]
pub enum OpCode {
    /// List a directory
    List = 0,
    /// Change the session's current directory
    ChangeDirectory = 1,
    /// Create a directory, with any missing parents
    MakeDirectory = 2,
    /// Rename or move a file or directory
    Rename = 3,
    /// Delete a file, or a directory tree
    Remove = 4,
    /// Report the session's current directory
    GetCurrentDirectory = 5,
    /// Write a chunk of a file
    PutFile = 6,
    /// Read a chunk of a file
    GetFile = 7,
    /// Report the size of a file
    GetFileSize = 8,
    /// Report server properties (currently its path separator)
    GetConfig = 9,
}

impl WireMessage for OpCode {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self as u8);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            let raw = reader.read_u8().await?;
            OpCode::from_repr(raw).ok_or(WireError::UnknownOpcode(raw))
        }
    }
}

/// Prefix of every request.
///
/// On the wire this is the opcode followed by a reserved `u32`.
/// The reserved field is always sent as 0 and is ignored on receipt; in particular it is
/// *not* a length, so it plays no part in framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// The operation requested
    pub opcode: OpCode,
}

impl Header {
    /// The on-wire size of a header
    pub const SIZE: usize = 5;
    /// The value sent in the reserved field
    const RESERVED: u32 = 0;

    /// Constructor
    #[must_use]
    pub fn new(opcode: OpCode) -> Self {
        Self { opcode }
    }

    /// Reads a header, distinguishing a cleanly closed stream from a broken one.
    ///
    /// # Return
    /// * `Ok(None)` if the stream ended before the first byte (the peer hung up between requests)
    /// * `Ok(Some(header))` on success
    /// * `Err` if the stream ended part way through, or the opcode is unknown
    pub async fn read_opt<R>(reader: &mut R) -> Result<Option<Self>, WireError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut first = [0u8; 1];
        if reader.read(&mut first).await? == 0 {
            return Ok(None);
        }
        let opcode = OpCode::from_repr(first[0]).ok_or(WireError::UnknownOpcode(first[0]))?;
        let reserved = u32::decode(reader).await?;
        if reserved != Self::RESERVED {
            tracing::trace!("ignoring reserved header value {reserved}");
        }
        Ok(Some(Self { opcode }))
    }
}

impl WireMessage for Header {
    fn encode(&self, buf: &mut BytesMut) {
        self.opcode.encode(buf);
        Self::RESERVED.encode(buf);
    }

    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move { Self::read_opt(reader).await?.ok_or(WireError::Truncated) }
    }
}
