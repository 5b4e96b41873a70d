// (c) 2026 fileshare contributors

//! Stream types and the message trait shared by client and server

use std::future::Future;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::WireError;

/////////////////////////////////////////////////////////////////////////////////////////////
// STREAM TYPEDEFS

/// Marker trait for streams used for sending data
pub trait SendingStream: AsyncWrite + Send + Unpin {}
impl SendingStream for OwnedWriteHalf {}

#[cfg(test)]
impl SendingStream for tokio_test::io::Mock {}

/// Marker trait for streams used for receiving data
pub trait ReceivingStream: AsyncRead + Send + Unpin {}
impl ReceivingStream for BufReader<OwnedReadHalf> {}

#[cfg(test)]
impl ReceivingStream for tokio_test::io::Mock {}

/// Syntactic sugar helper type
#[derive(Debug)]
pub struct SendReceivePair<S: SendingStream, R: ReceivingStream> {
    /// outbound data
    pub send: S,
    /// inbound data
    pub recv: R,
}

impl<S: SendingStream, R: ReceivingStream> From<(S, R)> for SendReceivePair<S, R> {
    fn from(value: (S, R)) -> Self {
        Self {
            send: value.0,
            recv: value.1,
        }
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
// MESSAGE ENCODING

/// Provides wire encoding and decoding for everything that travels over the protocol,
/// from primitive fields up to whole messages.
///
/// Encoding cannot fail; it appends to a buffer.
/// Decoding reads exactly as many bytes as the matching encoding wrote.
pub trait WireMessage
where
    Self: Sized + Send + Sync,
{
    /// Appends the wire encoding of this item to `buf`
    fn encode(&self, buf: &mut BytesMut);

    /// Reads one item from an async reader.
    ///
    /// Any error is a framing error; the stream cannot be trusted afterwards.
    fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Encodes this item into a fresh buffer
    fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf
    }
}
