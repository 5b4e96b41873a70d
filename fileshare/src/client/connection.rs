//! The call layer: one connection, one request in flight
// (c) 2026 fileshare contributors

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWriteExt as _, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::protocol::common::{ReceivingStream, SendReceivePair, SendingStream};
use crate::protocol::{
    ChangeDirectoryRequest, ChangeDirectoryResponse, FileIo, GetConfigRequest, GetConfigResponse,
    GetCurrentDirectoryRequest, GetCurrentDirectoryResponse, GetFileRequest, GetFileResponse,
    GetFileSizeRequest, GetFileSizeResponse, ListRequest, ListResponse, MAX_PAYLOAD_LEN,
    MakeDirectoryRequest, MakeDirectoryResponse, PutFileRequest, PutFileResponse, RemoveRequest,
    RemoveResponse, RenameRequest, RenameResponse, Request, WireError, WireMessage as _,
};

/// Default time allowed for a TCP connection to be established
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the call layer
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection could not be established (refused, unreachable, timed out)
    #[error("could not connect to {address}")]
    Connect {
        /// Address as given
        address: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// There is no open connection. Either none was made, or a previous failure dropped it.
    #[error("not connected")]
    NotConnected,
    /// A file content payload was larger than the protocol allows
    #[error("payload of {0} bytes is too large to send")]
    PayloadTooLarge(usize),
    /// The stream failed or could not be decoded; the connection has been dropped
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// The remote filesystem operations, as seen by a client.
///
/// Each call is one request/response round trip. A response whose `success` flag is false
/// is returned as `Ok`; only connection and framing failures are errors.
///
/// Implementors supply [`call`](RemoteFileSystem::call); the operations are built on it.
#[async_trait]
pub trait RemoteFileSystem: Send {
    /// Sends a request and waits for its response
    async fn call<Q: Request + 'static>(&mut self, request: &Q) -> Result<Q::Response, ClientError>;

    /// Lists a remote directory (the current directory if `path` is empty)
    async fn list(&mut self, path: &str) -> Result<ListResponse, ClientError> {
        self.call(&ListRequest { path: path.into() }).await
    }

    /// Changes the session's current directory
    async fn change_directory(&mut self, path: &str) -> Result<ChangeDirectoryResponse, ClientError> {
        self.call(&ChangeDirectoryRequest { path: path.into() })
            .await
    }

    /// Creates a remote directory and any missing parents
    async fn make_directory(&mut self, path: &str) -> Result<MakeDirectoryResponse, ClientError> {
        self.call(&MakeDirectoryRequest { path: path.into() }).await
    }

    /// Renames or moves a remote file or directory
    async fn rename(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<RenameResponse, ClientError> {
        self.call(&RenameRequest {
            source: source.into(),
            destination: destination.into(),
        })
        .await
    }

    /// Removes a remote file, or a directory and everything in it
    async fn remove(&mut self, path: &str, is_directory: bool) -> Result<RemoveResponse, ClientError> {
        self.call(&RemoveRequest {
            path: path.into(),
            is_directory,
        })
        .await
    }

    /// Asks for the session's current directory
    async fn get_current_directory(&mut self) -> Result<GetCurrentDirectoryResponse, ClientError> {
        self.call(&GetCurrentDirectoryRequest {}).await
    }

    /// Asks for the size of a remote file
    async fn get_file_size(&mut self, path: &str) -> Result<GetFileSizeResponse, ClientError> {
        self.call(&GetFileSizeRequest { path: path.into() }).await
    }

    /// Reads up to `length` bytes of a remote file, starting at `offset`
    async fn get_file(
        &mut self,
        path: &str,
        offset: i32,
        length: i32,
    ) -> Result<GetFileResponse, ClientError> {
        self.call(&GetFileRequest {
            io: FileIo {
                path: path.into(),
                file_offset: offset,
                io_length: length,
                content: Bytes::new(),
            },
        })
        .await
    }

    /// Writes `content` into a remote file at `offset`, creating the file if needed.
    ///
    /// With `truncate`, the file is emptied before the write.
    async fn put_file(
        &mut self,
        path: &str,
        offset: i32,
        content: Bytes,
        truncate: bool,
    ) -> Result<PutFileResponse, ClientError> {
        if content.len() > MAX_PAYLOAD_LEN {
            return Err(ClientError::PayloadTooLarge(content.len()));
        }
        let io_length =
            i32::try_from(content.len()).map_err(|_| ClientError::PayloadTooLarge(content.len()))?;
        self.call(&PutFileRequest {
            io: FileIo {
                path: path.into(),
                file_offset: offset,
                io_length,
                content,
            },
            truncate,
        })
        .await
    }

    /// Asks for the server's configuration (its path separator)
    async fn get_config(&mut self) -> Result<GetConfigResponse, ClientError> {
        self.call(&GetConfigRequest {}).await
    }
}

type TcpPair = SendReceivePair<OwnedWriteHalf, BufReader<OwnedReadHalf>>;

/// A client connection to a fileshare server.
///
/// `&mut self` on every call means only one request can be in flight.
#[derive(Debug)]
pub struct Client {
    stream: Option<TcpPair>,
    connect_timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates an unconnected client with the default connect timeout
    #[must_use]
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Creates an unconnected client
    #[must_use]
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
        }
    }

    /// Opens a connection, replacing any existing one
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        self.disconnect();
        let address = format!("{host}:{port}");
        debug!("connecting to {address}");
        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { address, source }),
            Err(_) => {
                return Err(ClientError::Connect {
                    address,
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connection timed out",
                    ),
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }
        let (recv, send) = stream.into_split();
        self.stream = Some((send, BufReader::new(recv)).into());
        Ok(())
    }

    /// Closes the connection, if there is one
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            trace!("disconnected");
        }
    }

    /// Is there an open connection?
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Writes a request then reads its response
async fn round_trip<S, R, Q>(
    stream: &mut SendReceivePair<S, R>,
    request: &Q,
) -> Result<Q::Response, WireError>
where
    S: SendingStream,
    R: ReceivingStream,
    Q: Request,
{
    trace!("sending {:?}", Q::OPCODE);
    stream.send.write_all(&request.to_framed_bytes()).await?;
    stream.send.flush().await?;
    <Q::Response as crate::protocol::WireMessage>::decode(&mut stream.recv).await
}

#[async_trait]
impl RemoteFileSystem for Client {
    async fn call<Q: Request + 'static>(&mut self, request: &Q) -> Result<Q::Response, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let result = round_trip(stream, request).await;
        if let Err(e) = &result {
            // the stream can't be resynchronised after this
            debug!("dropping connection: {e}");
            self.stream = None;
        }
        Ok(result?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{Client, ClientError, RemoteFileSystem, round_trip};
    use crate::protocol::common::SendReceivePair;
    use crate::protocol::{
        GetConfigRequest, GetConfigResponse, MAX_PAYLOAD_LEN, Request as _, WireError,
        WireMessage as _,
    };

    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn round_trip_on_mock() {
        let request = GetConfigRequest {};
        let response = GetConfigResponse {
            success: true,
            path_separator: "/".into(),
        };
        let send = Builder::new().write(&request.to_framed_bytes()).build();
        let recv = Builder::new().read(&response.to_bytes()).build();
        let mut pair = SendReceivePair::from((send, recv));
        let got = round_trip(&mut pair, &request).await.unwrap();
        assert_eq!(got, response);
    }

    #[tokio::test]
    async fn round_trip_closed_by_peer() {
        let request = GetConfigRequest {};
        let send = Builder::new().write(&request.to_framed_bytes()).build();
        let recv = Builder::new().build();
        let mut pair = SendReceivePair::from((send, recv));
        let e = round_trip(&mut pair, &request).await.unwrap_err();
        assert!(matches!(e, WireError::Truncated));
    }

    #[tokio::test]
    async fn calls_need_a_connection() {
        let mut client = Client::new();
        assert!(!client.is_connected());
        let e = client.get_config().await.unwrap_err();
        assert!(matches!(e, ClientError::NotConnected));
        client.disconnect(); // idempotent
    }

    #[tokio::test]
    async fn oversized_put_is_refused_locally() {
        let mut client = Client::new();
        let content = Bytes::from(vec![0u8; MAX_PAYLOAD_LEN + 1]);
        let e = client.put_file("f", 0, content, false).await.unwrap_err();
        assert!(matches!(e, ClientError::PayloadTooLarge(n) if n == MAX_PAYLOAD_LEN + 1));
    }

    #[tokio::test]
    async fn connection_refused() {
        // grab a free port, then close it so nothing is listening
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let mut client = Client::with_connect_timeout(Duration::from_secs(2));
        let e = client.connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(e, ClientError::Connect { .. }));
        assert!(e.to_string().contains(&format!("127.0.0.1:{port}")));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn dropped_on_framing_error() {
        // a server that answers with garbage then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(&[9]).await.unwrap(); // not a valid bool
        });

        let mut client = Client::new();
        client.connect("127.0.0.1", port).await.unwrap();
        assert!(client.is_connected());
        let e = client.get_current_directory().await.unwrap_err();
        assert!(matches!(e, ClientError::Wire(WireError::InvalidBool(9))));
        assert!(!client.is_connected());
        let e = client.get_current_directory().await.unwrap_err();
        assert!(matches!(e, ClientError::NotConnected));
        server.await.unwrap();
    }
}
