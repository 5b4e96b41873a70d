//! In-memory connections for protocol and session tests
// (c) 2026 fileshare contributors

use crate::protocol::common::{ReceivingStream, SendReceivePair, SendingStream};
use crate::protocol::{Request, WireError, WireMessage};

use tokio::io::{AsyncWriteExt as _, ReadHalf, SimplexStream, WriteHalf, simplex};

pub(crate) type TestStreamPair = SendReceivePair<WriteHalf<SimplexStream>, ReadHalf<SimplexStream>>;

impl SendingStream for WriteHalf<SimplexStream> {}
impl ReceivingStream for ReadHalf<SimplexStream> {}

const STREAM_BUFFER_SIZE: usize = 65_536;

/// Returns the two ends of an in-memory connection, built from two one-way pipes.
/// Whatever one end sends, the other end receives.
pub(crate) fn new_test_plumbing() -> (TestStreamPair, TestStreamPair) {
    let p1 = simplex(STREAM_BUFFER_SIZE);
    let p2 = simplex(STREAM_BUFFER_SIZE);
    let r1 = (p1.1, p2.0).into();
    let r2 = (p2.1, p1.0).into();
    (r1, r2)
}

/// Plays the client side of one request/response exchange over a test pipe
pub(crate) async fn exchange<Q: Request>(
    pipe: &mut TestStreamPair,
    request: &Q,
) -> Result<Q::Response, WireError> {
    pipe.send.write_all(&request.to_framed_bytes()).await?;
    pipe.send.flush().await?;
    <Q::Response as WireMessage>::decode(&mut pipe.recv).await
}
