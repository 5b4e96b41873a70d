//! Client side: the request layer, the chunked transfer driver and the command-line client
// (c) 2026 fileshare contributors

mod connection;
pub use connection::{Client, ClientError, DEFAULT_CONNECT_TIMEOUT, RemoteFileSystem};

mod progress;
pub(crate) use progress::MAX_UPDATE_FPS;
pub use progress::{ProgressSnapshot, THROUGHPUT_SAMPLES, TransferProgress};

mod transfer;
pub use transfer::{DEFAULT_CHUNK_SIZE, Transfer, TransferError, TransferOutcome};

mod main_loop;
pub(crate) use main_loop::client_main;
