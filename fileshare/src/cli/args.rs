//! Command line argument definitions
// (c) 2026 fileshare contributors

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::styles::CLAP_STYLES;
use crate::config::ConfigOverrides;
use crate::util::TimeFormat;

/// Output options shared by the client and server
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct OutputOptions {
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=fileshare=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Output"), display_order(0))]
    pub debug: bool,

    /// Quiet mode
    ///
    /// Switches off the progress display; reports only errors
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(
        short('l'),
        long,
        action,
        value_name("FILE"),
        help_heading("Output"),
        next_line_help(true)
    )]
    pub log_file: Option<PathBuf>,
}

/// Serves a directory tree over the fileshare protocol until interrupted
#[derive(Clone, Debug, Parser)]
#[command(
    name = "fileshare-server",
    version,
    styles = CLAP_STYLES,
)]
pub(crate) struct ServerArgs {
    #[command(flatten)]
    pub output: OutputOptions,

    /// Format of timestamps in log messages
    #[arg(long, value_name = "FORMAT", value_enum, help_heading("Output"))]
    pub time_format: Option<TimeFormat>,

    /// Address to listen on, e.g. `0.0.0.0`, `::` or `localhost`
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// TCP port to listen on
    #[arg(value_name = "PORT")]
    pub port: u16,

    /// Directory each session starts in [default: the current directory]
    #[arg(value_name = "START_DIRECTORY")]
    pub start_directory: Option<PathBuf>,
}

/// Browses and transfers files on a fileshare server
#[derive(Clone, Debug, Parser)]
#[command(
    name = "fileshare",
    version,
    styles = CLAP_STYLES,
)]
pub(crate) struct ClientArgs {
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub config: ConfigOverrides,

    /// Outputs the working configuration, then exits
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub show_config: bool,

    /// Outputs the paths of the configuration files we look for, then exits
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub config_files: bool,

    /// Server host name or address
    #[arg(value_name = "HOST", required_unless_present_any(["show_config", "config_files"]))]
    pub host: Option<String>,

    /// Server port
    #[arg(value_name = "PORT", required_unless_present_any(["show_config", "config_files"]))]
    pub port: Option<u16>,

    /// Change to this remote directory before running the command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<String>,

    #[command(subcommand)]
    pub command: Option<ClientCommand>,
}

/// Operations the client can perform
#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub(crate) enum ClientCommand {
    /// List a remote directory
    Ls {
        /// Directory to list [default: the current directory]
        path: Option<String>,
    },
    /// Print the remote current directory
    Pwd,
    /// Create a remote directory, and any missing parents
    Mkdir {
        /// Directory to create
        path: String,
    },
    /// Rename or move a remote file or directory
    Mv {
        /// Existing path
        source: String,
        /// New path
        destination: String,
    },
    /// Remove a remote file
    Rm {
        /// Remove a directory and everything in it
        #[arg(short, long)]
        recursive: bool,
        /// Path to remove
        path: String,
    },
    /// Print the size of a remote file
    Size {
        /// Remote file
        path: String,
    },
    /// Download a remote file or directory tree
    Get {
        /// Remote file or directory
        remote: String,
        /// Local destination [default: the remote name, in the current directory]
        local: Option<PathBuf>,
    },
    /// Upload a local file or directory tree
    Put {
        /// Local file or directory
        local: PathBuf,
        /// Remote destination [default: the local name, in the remote current directory]
        remote: Option<String>,
    },
    /// Print the server's path separator
    Separator,
}
