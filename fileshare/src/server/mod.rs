//! Server side: the connection listener and its per-connection sessions
// (c) 2026 fileshare contributors

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{Instrument as _, debug, debug_span, info, trace, warn};

use crate::protocol::common::SendReceivePair;
use crate::util::path::normalize;

mod handlers;
mod session;
use session::Session;

/// Listen backlog for the server socket
pub const LISTEN_BACKLOG: u32 = 8;

/// Errors that stop a [`Listener`] from starting or running
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` or `serve` was called on a listener whose accept loop is already running
    #[error("the listener is already running")]
    AlreadyRunning,
    /// The bind address could not be resolved or bound
    #[error("could not listen on {address}")]
    Bind {
        /// Address as given
        address: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// The start directory is missing or is not a directory
    #[error("start directory {path:?} is not usable")]
    StartDirectory {
        /// Directory as given
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct Shared {
    start_dir: PathBuf,
    /// Set while the accept loop should keep going
    running: AtomicBool,
    /// Set from when a loop is claimed until it has finished draining
    accepting: AtomicBool,
    live: AtomicUsize,
    shutdown: Notify,
    drained: Notify,
}

impl Shared {
    fn is_idle(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst) && self.live.load(Ordering::SeqCst) == 0
    }
}

/// Accepts connections and runs one [session](Session) for each.
///
/// Clones share the same state, so one clone can [`stop`](Listener::stop) a listener
/// that another clone is running.
#[derive(Clone, Debug)]
pub struct Listener {
    inner: Arc<Shared>,
}

/// Counts one live session for as long as it exists
struct LiveSession(Arc<Shared>);

impl LiveSession {
    fn new(shared: &Arc<Shared>) -> Self {
        let _ = shared.live.fetch_add(1, Ordering::SeqCst);
        Self(shared.clone())
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        let _ = self.0.live.fetch_sub(1, Ordering::SeqCst);
        self.0.drained.notify_waiters();
    }
}

/// Marks the accept loop as finished when dropped
struct Running<'a>(&'a Shared);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.accepting.store(false, Ordering::SeqCst);
        self.0.drained.notify_waiters();
    }
}

impl Listener {
    /// Creates a listener whose sessions start in `start_dir`, or in the process working
    /// directory if none is given.
    pub fn new(start_dir: Option<&Path>) -> Result<Self, ServerError> {
        let given = match start_dir {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let absolute = std::path::absolute(&given).map_err(|source| {
            ServerError::StartDirectory {
                path: given.clone(),
                source,
            }
        })?;
        let start_dir = normalize(&absolute);
        match std::fs::metadata(&start_dir) {
            Ok(m) if m.is_dir() => (),
            Ok(_) => {
                return Err(ServerError::StartDirectory {
                    path: given,
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotADirectory,
                        "not a directory",
                    ),
                });
            }
            Err(source) => return Err(ServerError::StartDirectory { path: given, source }),
        }

        Ok(Self {
            inner: Arc::new(Shared {
                start_dir,
                running: AtomicBool::new(false),
                accepting: AtomicBool::new(false),
                live: AtomicUsize::new(0),
                shutdown: Notify::new(),
                drained: Notify::new(),
            }),
        })
    }

    /// The absolute directory every new session starts in
    #[must_use]
    pub fn start_directory(&self) -> &Path {
        &self.inner.start_dir
    }

    /// Number of sessions currently running
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Whether an accept loop is running (or still draining)
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    fn claim(&self) -> Result<Running<'_>, ServerError> {
        self.inner
            .accepting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ServerError::AlreadyRunning)?;
        self.inner.running.store(true, Ordering::SeqCst);
        Ok(Running(&self.inner))
    }

    /// Binds to `address:port` and serves connections until [`stop`](Self::stop) is called.
    ///
    /// Returns once the accept loop has ended and every session it started has finished.
    pub async fn start(&self, address: &str, port: u16) -> Result<(), ServerError> {
        let running = self.claim()?;
        let listener = bind(address, port).await?;
        self.accept_loop(listener, running).await
    }

    /// As [`start`](Self::start), on a socket the caller has already bound
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let running = self.claim()?;
        self.accept_loop(listener, running).await
    }

    async fn accept_loop(
        &self,
        listener: TcpListener,
        running: Running<'_>,
    ) -> Result<(), ServerError> {
        let shared = &self.inner;
        if let Ok(addr) = listener.local_addr() {
            info!("listening on {addr}, serving {}", shared.start_dir.display());
        }
        let mut tasks = JoinSet::new();
        let shutdown = shared.shutdown.notified();
        tokio::pin!(shutdown);

        loop {
            let _ = shutdown.as_mut().enable();
            if !shared.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("session task failed: {e}");
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let guard = LiveSession::new(shared);
                        let start = shared.start_dir.clone();
                        let _ = tasks.spawn(
                            run_session(stream, peer, start, guard)
                                .instrument(debug_span!("session", %peer)),
                        );
                    }
                    Err(e) => warn!("accept failed: {e}"),
                },
            }
        }

        // Stop accepting straight away; pending connections in the backlog are refused.
        drop(listener);
        info!("stopping; waiting for {} session(s)", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("session task failed: {e}");
            }
        }
        info!("stopped");
        drop(running);
        Ok(())
    }

    /// Stops the accept loop and waits until every session has finished.
    ///
    /// Sessions are not interrupted; each ends when its peer disconnects.
    /// Returns immediately if the listener is not running.
    pub async fn stop(&self) {
        let shared = &self.inner;
        shared.running.store(false, Ordering::SeqCst);
        shared.shutdown.notify_waiters();
        loop {
            let drained = shared.drained.notified();
            tokio::pin!(drained);
            let _ = drained.as_mut().enable();
            if shared.is_idle() {
                break;
            }
            trace!(
                "waiting for {} session(s) to drain",
                shared.live.load(Ordering::SeqCst)
            );
            drained.await;
        }
    }
}

async fn bind(address: &str, port: u16) -> Result<TcpListener, ServerError> {
    let bind_error = |source| ServerError::Bind {
        address: format!("{address}:{port}"),
        source,
    };
    let addr = tokio::net::lookup_host((address, port))
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address did not resolve",
            ))
        })?;
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(bind_error)?;
    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(addr).map_err(bind_error)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_error)
}

async fn run_session(stream: TcpStream, peer: SocketAddr, start: PathBuf, _guard: LiveSession) {
    debug!("connected");
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY: {e}");
    }
    let (recv, send) = stream.into_split();
    let mut pair = SendReceivePair::from((send, BufReader::new(recv)));
    match Session::new(start).run(&mut pair).await {
        Ok(()) => debug!("disconnected"),
        Err(e) => warn!("dropping connection from {peer}: {e}"),
    }
}

/// Runs a listener until interrupted by Ctrl-C
#[cfg_attr(coverage_nightly, coverage(off))] // thin adaptor
pub(crate) async fn server_main(
    address: &str,
    port: u16,
    start_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let listener = Listener::new(start_dir)?;
    let stopper = listener.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            stopper.stop().await;
        }
    });
    listener.start(address, port).await?;
    Ok(())
}
