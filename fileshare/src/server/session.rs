//! Per-connection request loop
// (c) 2026 fileshare contributors

use std::path::PathBuf;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt as _;
use tracing::{Instrument as _, debug, trace, trace_span};

use crate::protocol::common::{ReceivingStream, SendReceivePair, SendingStream};
use crate::protocol::{Command, Response, WireError, WireMessage as _};

/// The state owned by one accepted connection.
///
/// A session moves between awaiting a request and dispatching it, until the peer closes
/// the stream. Its current directory is private to it; no other session can see or change it.
#[derive(Debug)]
pub(crate) struct Session {
    /// Always absolute and normalised
    pub(super) current_dir: PathBuf,
}

impl Session {
    /// Creates a session rooted at `start_dir`, which must be absolute
    pub(crate) fn new(start_dir: PathBuf) -> Self {
        debug_assert!(start_dir.is_absolute());
        Self {
            current_dir: start_dir,
        }
    }

    #[cfg(test)]
    pub(crate) fn current_dir(&self) -> &std::path::Path {
        &self.current_dir
    }

    /// Serves requests until the peer closes the stream.
    ///
    /// # Return
    /// * `Ok(())` when the peer hung up between requests
    /// * `Err` on a framing error or stream failure; the connection must then be dropped
    ///   (no response is sent for the request that failed to decode)
    pub(crate) async fn run<S, R>(&mut self, stream: &mut SendReceivePair<S, R>) -> Result<(), WireError>
    where
        S: SendingStream,
        R: ReceivingStream,
    {
        loop {
            trace!("awaiting request");
            let Some(command) = Command::read(&mut stream.recv).await? else {
                trace!("peer closed the stream");
                return Ok(());
            };
            let span = trace_span!("request", op = %command.opcode());
            let response = self.dispatch(command).instrument(span).await;
            stream.send.write_all(&response).await?;
            stream.send.flush().await?;
        }
    }

    /// Runs the handler for one request and encodes its response.
    ///
    /// Handler errors are contained here: they become a failure response and the session carries on.
    async fn dispatch(&mut self, command: Command) -> BytesMut {
        match command {
            Command::List(req) => respond(self.list(req).await),
            Command::ChangeDirectory(req) => respond(self.change_directory(req).await),
            Command::MakeDirectory(req) => respond(self.make_directory(req).await),
            Command::Rename(req) => respond(self.rename(req).await),
            Command::Remove(req) => respond(self.remove(req).await),
            Command::GetCurrentDirectory(req) => respond(self.get_current_directory(&req)),
            Command::PutFile(req) => respond(self.put_file(req).await),
            Command::GetFile(req) => respond(self.get_file(req).await),
            Command::GetFileSize(req) => respond(self.get_file_size(req).await),
            Command::GetConfig(req) => respond(Self::get_config(&req)),
        }
    }
}

fn respond<T: Response>(result: anyhow::Result<T>) -> BytesMut {
    result
        .unwrap_or_else(|e| {
            debug!("request failed: {e:#}");
            T::default()
        })
        .to_bytes()
}
