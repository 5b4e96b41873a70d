//! The transfer driver: whole files and directory trees, moved in bounded chunks
// (c) 2026 fileshare contributors

use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::connection::{ClientError, RemoteFileSystem};
use super::progress::TransferProgress;
use crate::protocol::{FileStat, MAX_PAYLOAD_LEN, OpCode, Response};
use crate::util::dirwalk::{WalkError, local_tree};
use crate::util::path::{is_plain_name, join_remote, remote_basename};

/// Default transfer chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// File offsets are `int32` on the wire
const MAX_FILE_SIZE: u64 = i32::MAX as u64;

/// How a transfer ended, if it did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransferOutcome {
    /// Everything was transferred
    Completed,
    /// The transfer was cancelled before it finished
    Cancelled,
}

/// Failures that abort a transfer
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The server refused an operation
    #[error("{op} failed on remote path {path}")]
    Remote {
        /// The operation that failed
        op: OpCode,
        /// The remote path concerned
        path: String,
    },
    /// A local filesystem operation failed
    #[error("{}", path.display())]
    Local {
        /// The local path concerned
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// The file is too large for the protocol's 32-bit offsets
    #[error("{path} is too large to transfer ({size} bytes)")]
    TooLarge {
        /// The file concerned
        path: String,
        /// Its size
        size: u64,
    },
    /// The server stopped returning data before the file was complete
    #[error("{path}: received {received} of {expected} bytes")]
    ShortRead {
        /// The remote file
        path: String,
        /// Bytes received
        received: u64,
        /// Bytes expected
        expected: u64,
    },
    /// A directory contains itself, through a symbolic link
    #[error("directory loop at {path}")]
    Loop {
        /// The directory that was reached a second time
        path: String,
    },
    /// The server listed a name that is not a single path component
    #[error("refusing unsafe file name {name:?}")]
    InvalidName {
        /// The name as listed
        name: String,
    },
    /// The connection failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn local_error(path: &Path) -> impl FnOnce(std::io::Error) -> TransferError + '_ {
    move |source| TransferError::Local {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_error(e: WalkError) -> TransferError {
    match e {
        WalkError::Loop { path } => TransferError::Loop {
            path: path.display().to_string(),
        },
        WalkError::NotUnicode { path } => TransferError::InvalidName {
            name: path.to_string_lossy().into_owned(),
        },
        WalkError::Io { path, source } => TransferError::Local { path, source },
    }
}

fn check<R: Response>(
    response: R,
    op: OpCode,
    path: &str,
) -> Result<R, TransferError> {
    if response.success() {
        Ok(response)
    } else {
        Err(TransferError::Remote {
            op,
            path: path.to_string(),
        })
    }
}

/// Moves files and directory trees over a [`RemoteFileSystem`], one chunk per call.
///
/// Cancellation is checked before every item and every chunk. A call already in flight
/// always completes first.
#[derive(Debug)]
pub struct Transfer<'a, C: RemoteFileSystem> {
    remote: &'a mut C,
    chunk_size: usize,
    cancel: CancellationToken,
    progress: TransferProgress,
    separator: Option<String>,
}

impl<'a, C: RemoteFileSystem> Transfer<'a, C> {
    /// Creates a transfer driver. `chunk_size` is clamped to what the protocol allows.
    pub fn new(remote: &'a mut C, chunk_size: usize) -> Self {
        Self::with_cancellation(remote, chunk_size, CancellationToken::new())
    }

    /// Creates a transfer driver that stops when `cancel` is cancelled
    pub fn with_cancellation(
        remote: &'a mut C,
        chunk_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            remote,
            chunk_size: chunk_size.clamp(1, MAX_PAYLOAD_LEN),
            cancel,
            progress: TransferProgress::new(),
            separator: None,
        }
    }

    /// The progress record for this transfer, for an observer to poll
    #[must_use]
    pub fn progress(&self) -> TransferProgress {
        self.progress.clone()
    }

    /// A token which cancels this transfer
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The server's path separator, asked for once per transfer
    async fn separator(&mut self) -> Result<String, TransferError> {
        if let Some(sep) = &self.separator {
            return Ok(sep.clone());
        }
        let config = check(self.remote.get_config().await?, OpCode::GetConfig, "")?;
        if config.path_separator.is_empty() {
            return Err(TransferError::Remote {
                op: OpCode::GetConfig,
                path: String::new(),
            });
        }
        self.separator = Some(config.path_separator.clone());
        Ok(config.path_separator)
    }

    /// Describes a remote path, so it can be downloaded by name.
    ///
    /// It is a directory if it can be listed, else a file if its size can be read.
    pub async fn remote_stat(&mut self, path: &str) -> Result<FileStat, TransferError> {
        let separator = self.separator().await?;
        let name = remote_basename(path, &separator).to_string();
        if self.remote.list(path).await?.success {
            return Ok(FileStat {
                full_path: path.into(),
                path: name,
                size: 0,
                is_directory: true,
            });
        }
        let size = check(
            self.remote.get_file_size(path).await?,
            OpCode::GetFileSize,
            path,
        )?;
        Ok(FileStat {
            full_path: path.into(),
            path: name,
            size: size.size,
            is_directory: false,
        })
    }

    /// Downloads a remote file or directory tree to `destination`
    pub async fn download(
        &mut self,
        source: &FileStat,
        destination: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        // each directory carries the remote paths of the directories above it
        let mut pending = vec![(source.clone(), destination.to_path_buf(), Vec::new())];
        self.progress.add_items(1);

        while let Some((stat, local, ancestors)) = pending.pop() {
            if self.cancelled() {
                return Ok(TransferOutcome::Cancelled);
            }
            if stat.is_directory {
                if ancestors.contains(&stat.full_path) {
                    return Err(TransferError::Loop {
                        path: stat.full_path,
                    });
                }
                trace!("download directory {} -> {local:?}", stat.full_path);
                fs::create_dir_all(&local)
                    .await
                    .map_err(local_error(&local))?;
                let listing = check(
                    self.remote.list(&stat.full_path).await?,
                    OpCode::List,
                    &stat.full_path,
                )?;
                self.progress.add_items(listing.items.len() as u64);
                let mut chain = ancestors;
                chain.push(stat.full_path.clone());
                // reversed so the stack yields them in listing order
                for child in listing.items.into_iter().rev() {
                    if !is_plain_name(&child.path) {
                        return Err(TransferError::InvalidName { name: child.path });
                    }
                    let child_local = local.join(&child.path);
                    let child_chain = if child.is_directory {
                        chain.clone()
                    } else {
                        Vec::new()
                    };
                    pending.push((child, child_local, child_chain));
                }
                if self.cancelled() {
                    return Ok(TransferOutcome::Cancelled);
                }
            } else if self.download_file(&stat, &local).await? == TransferOutcome::Cancelled {
                return Ok(TransferOutcome::Cancelled);
            }
            self.progress.item_done();
        }
        Ok(TransferOutcome::Completed)
    }

    async fn download_file(
        &mut self,
        stat: &FileStat,
        local: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        let remote_path = stat.full_path.as_str();
        let size = check(
            self.remote.get_file_size(remote_path).await?,
            OpCode::GetFileSize,
            remote_path,
        )?
        .size;
        let expected = u64::try_from(size).unwrap_or_default();
        if expected > MAX_FILE_SIZE {
            return Err(TransferError::TooLarge {
                path: remote_path.into(),
                size: expected,
            });
        }
        debug!("download {remote_path} ({expected} bytes) -> {local:?}");
        self.progress.begin_file(&stat.path, expected);

        let mut file = File::create(local).await.map_err(local_error(local))?;
        let mut received = 0u64;
        while received < expected {
            if self.cancelled() {
                drop(file);
                // a partial file must not look like a complete one
                let _ = fs::remove_file(local).await;
                return Ok(TransferOutcome::Cancelled);
            }
            // both bounded by i32::MAX, checked above
            let offset = i32::try_from(received).unwrap_or(i32::MAX);
            let wanted = i32::try_from((expected - received).min(self.chunk_size as u64))
                .unwrap_or(i32::MAX);
            let started = Instant::now();
            let response = check(
                self.remote.get_file(remote_path, offset, wanted).await?,
                OpCode::GetFile,
                remote_path,
            )?;
            let content = response.io.content;
            if content.is_empty() {
                return Err(TransferError::ShortRead {
                    path: remote_path.into(),
                    received,
                    expected,
                });
            }
            file.write_all(&content).await.map_err(local_error(local))?;
            received += content.len() as u64;
            self.progress
                .record_chunk(content.len() as u64, started.elapsed());
        }
        file.flush().await.map_err(local_error(local))?;
        Ok(TransferOutcome::Completed)
    }

    /// Uploads a local file or directory tree to `destination` on the server.
    ///
    /// The whole local tree is enumerated before anything is sent, so a tree that cannot
    /// be walked (a symbolic link loop, an unreadable directory) fails without touching
    /// the server.
    pub async fn upload(
        &mut self,
        source: &Path,
        destination: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let root = source.to_path_buf();
        let tree = tokio::task::spawn_blocking(move || local_tree(&root))
            .await
            .map_err(|e| TransferError::Local {
                path: source.to_path_buf(),
                source: std::io::Error::other(e),
            })?
            .map_err(walk_error)?;
        let separator = self.separator().await?;
        self.progress.add_items(tree.len() as u64);

        for entry in tree {
            if self.cancelled() {
                return Ok(TransferOutcome::Cancelled);
            }
            let remote = entry
                .relative
                .iter()
                .fold(destination.to_string(), |base, leaf| {
                    join_remote(&base, &separator, leaf)
                });
            if entry.is_dir {
                trace!("upload directory {:?} -> {remote}", entry.path);
                let _ = check(
                    self.remote.make_directory(&remote).await?,
                    OpCode::MakeDirectory,
                    &remote,
                )?;
            } else if self.upload_file(&entry.path, &remote, entry.size).await?
                == TransferOutcome::Cancelled
            {
                return Ok(TransferOutcome::Cancelled);
            }
            self.progress.item_done();
        }
        Ok(TransferOutcome::Completed)
    }

    async fn upload_file(
        &mut self,
        local: &Path,
        remote: &str,
        size: u64,
    ) -> Result<TransferOutcome, TransferError> {
        if size > MAX_FILE_SIZE {
            return Err(TransferError::TooLarge {
                path: local.display().to_string(),
                size,
            });
        }
        debug!("upload {local:?} ({size} bytes) -> {remote}");
        let name = local
            .file_name()
            .map_or_else(|| remote.to_string(), |n| n.to_string_lossy().into_owned());
        self.progress.begin_file(&name, size);
        let mut file = File::open(local).await.map_err(local_error(local))?;

        // create or empty the remote file first
        let _ = check(
            self.remote.put_file(remote, 0, Bytes::new(), true).await?,
            OpCode::PutFile,
            remote,
        )?;

        let mut sent = 0u64;
        loop {
            if self.cancelled() {
                return Ok(TransferOutcome::Cancelled);
            }
            let mut chunk = Vec::with_capacity(self.chunk_size);
            let n = (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .await
                .map_err(local_error(local))?;
            if n == 0 {
                break;
            }
            let offset = i32::try_from(sent).map_err(|_| TransferError::TooLarge {
                path: local.display().to_string(),
                size: sent + n as u64,
            })?;
            let started = Instant::now();
            let response = check(
                self.remote
                    .put_file(remote, offset, Bytes::from(chunk), false)
                    .await?,
                OpCode::PutFile,
                remote,
            )?;
            if usize::try_from(response.written_length).ok() != Some(n) {
                return Err(TransferError::Remote {
                    op: OpCode::PutFile,
                    path: remote.into(),
                });
            }
            sent += n as u64;
            self.progress.record_chunk(n as u64, started.elapsed());
        }
        Ok(TransferOutcome::Completed)
    }
}
