// (c) 2026 fileshare contributors

#![allow(clippy::doc_markdown)]
//! `fileshare` lets a client browse and transfer files on a remote machine over plain TCP.
//!
//! ## Overview
//! - 🗂️ Remote browsing: list, change directory, make directory, rename, remove
//! - 📦 Chunked transfer of files and whole directory trees, in both directions
//! - 🛑 Cancellable transfers with live progress and throughput reporting
//! - 🔌 A compact binary [protocol] of self-describing messages, one request in flight at a time
//!
//! ## 🧰 Getting Started
//!
//! On the machine holding the files:
//!
//! ```text
//! fileshare-server 0.0.0.0 9000 /srv/files
//! ```
//!
//! From anywhere that can reach it:
//!
//! ```text
//! fileshare server.example 9000 ls
//! fileshare server.example 9000 get reports/q3.pdf
//! fileshare server.example 9000 put ./photos
//! ```
//!
//! Each connection has its own current directory, which starts at the server's start directory.
//! Paths may be absolute, or relative to that current directory.
//!
//! #### Limitations
//! - There is no authentication and no encryption. Anyone who can reach the port can read and
//!   write anything the server process can. Only run the server on networks you trust.
//! - Individual files are limited to 2 GiB, because offsets on the wire are 32-bit.
//!
//! ## Configuration
//!
//! The client reads optional configuration files and environment variables. See [config] for details.
//!
//! ## Library use
//!
//! * [`Listener`] runs a server inside your own tokio runtime.
//! * [`Client`] issues individual requests through the [`RemoteFileSystem`] trait.
//! * [`Transfer`] drives chunked, cancellable uploads and downloads over any [`RemoteFileSystem`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub(crate) mod cli;
pub use cli::{client_cli, server_cli, styles};

pub mod client;
pub use client::{Client, ClientError, RemoteFileSystem, Transfer, TransferError, TransferOutcome};

pub mod config;
pub use config::Configuration;

pub mod protocol;

pub mod server;
pub use server::{Listener, ServerError};

pub mod util;
