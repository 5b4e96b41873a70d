//! Command Line Interface for the fileshare client and server
// (c) 2026 fileshare contributors
mod args;
pub(crate) use args::{ClientArgs, ClientCommand, OutputOptions};
mod cli_main;
pub use cli_main::{client_cli, server_cli};
pub mod styles;
