// (c) 2026 fileshare contributors
//! # 📖 Configuration management
//!
//! The client and server obtain run-time configuration from the following sources,
//! highest priority first:
//! 1. Command-line options
//! 2. Environment variables prefixed `FILESHARE_`, e.g. `FILESHARE_CHUNK_SIZE=1048576`
//! 3. The user's configuration file
//!    * On Linux, this is `~/.config/fileshare/fileshare.toml`
//!    * On Windows, this is `%AppData%\Roaming\fileshare\fileshare.toml`
//! 4. The system-wide configuration file
//!    * On Unix, this is `/etc/fileshare.toml`
//!    * On Windows, this is `%ProgramData%\fileshare.toml`
//! 5. Hard-wired defaults
//!
//! Run `fileshare --config-files` for a list of which files we read, and
//! `fileshare --show-config` to see the working configuration and where each value came from.
//!
//! ## File format
//!
//! Configuration files are TOML. Every key is optional.
//!
//! ```toml
//! chunk_size = 1048576      # bytes per request during a transfer
//! connect_timeout = 10      # seconds
//! progress_interval = 500   # milliseconds
//! time_format = "utc"       # local, utc or rfc3339
//! ```
//!
//! The set of supported fields is the [Configuration] structure.

mod structure;
pub use structure::{ConfigOverrides, Configuration};

mod sysdefault;
use sysdefault::SystemDefault;

mod manager;
pub use manager::Manager;

pub(crate) const BASE_CONFIG_FILENAME: &str = "fileshare.toml";

/// Prefix of environment variables that set configuration options
pub(crate) const ENV_PREFIX: &str = "FILESHARE_";
