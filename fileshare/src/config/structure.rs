//! Configuration structure
// (c) 2026 fileshare contributors

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Args;
use figment::{Metadata, Provider, providers::Serialized};
use human_repr::{HumanCount as _, HumanDuration as _};
use serde::{Deserialize, Serialize};

use crate::protocol::MAX_PAYLOAD_LEN;
use crate::util::TimeFormat;

/// The set of configurable options.
///
/// In configuration files and environment variables the field names are `snake_case`;
/// on the command line they are kebab-case.
///
/// There is no `default()`; the hard-wired values are [`Configuration::system_default()`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Bytes moved per `GetFile`/`PutFile` call during a transfer
    pub chunk_size: usize,
    /// Seconds allowed for a connection to be established
    pub connect_timeout: u16,
    /// Milliseconds between progress display updates
    pub progress_interval: u64,
    /// Format of timestamps in log messages
    pub time_format: TimeFormat,
}

static SYSTEM_DEFAULT_CONFIG: LazyLock<Configuration> = LazyLock::new(|| Configuration {
    chunk_size: crate::client::DEFAULT_CHUNK_SIZE,
    connect_timeout: 5,
    progress_interval: 250,
    time_format: TimeFormat::Local,
});

impl Configuration {
    /// Hard-wired configuration defaults
    #[must_use]
    pub fn system_default() -> &'static Self {
        &SYSTEM_DEFAULT_CONFIG
    }

    /// Accessor for `connect_timeout` as a Duration
    #[must_use]
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.into())
    }

    /// Accessor for `progress_interval` as a Duration
    #[must_use]
    pub fn progress_interval_duration(&self) -> Duration {
        Duration::from_millis(self.progress_interval)
    }

    /// Checks the values are usable
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_PAYLOAD_LEN).contains(&self.chunk_size),
            "chunk_size must be between 1 and {MAX_PAYLOAD_LEN} bytes (got {})",
            self.chunk_size
        );
        ensure!(self.connect_timeout > 0, "connect_timeout must be non-zero");
        ensure!(
            self.progress_interval > 0,
            "progress_interval must be non-zero"
        );
        Ok(())
    }

    /// Field names and human-readable values, in declaration order
    #[must_use]
    pub(crate) fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "chunk_size",
                format!(
                    "{} ({})",
                    self.chunk_size,
                    self.chunk_size.human_count_bytes()
                ),
            ),
            (
                "connect_timeout",
                self.connect_timeout_duration().human_duration().to_string(),
            ),
            (
                "progress_interval",
                self.progress_interval_duration().human_duration().to_string(),
            ),
            ("time_format", self.time_format.to_string()),
        ]
    }
}

/// Configuration options that may be given on the command line.
///
/// Anything left unset falls through to lower priority sources.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[command(next_help_heading = "Configuration")]
pub struct ConfigOverrides {
    /// Bytes moved per request during a transfer [default: 4 MiB]
    #[arg(long, value_name = "BYTES")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Seconds allowed for the connection to be established [default: 5]
    #[arg(long, value_name = "SECONDS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u16>,

    /// Milliseconds between progress display updates [default: 250]
    #[arg(long, value_name = "MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<u64>,

    /// Format of timestamps in log messages
    #[arg(long, value_name = "FORMAT", value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,
}

impl ConfigOverrides {
    const META_NAME: &str = "command line";
}

impl Provider for ConfigOverrides {
    fn metadata(&self) -> Metadata {
        Metadata::named(Self::META_NAME)
    }

    fn data(
        &self,
    ) -> std::result::Result<
        figment::value::Map<figment::Profile, figment::value::Dict>,
        figment::Error,
    > {
        Serialized::defaults(self).data()
    }
}
