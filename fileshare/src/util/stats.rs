//! Throughput figures
// (c) 2026 fileshare contributors

use human_repr::HumanThroughput as _;
use std::{fmt::Display, time::Duration};

/// A transfer rate in bytes per second, which displays as e.g. `12.3MB/s`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRate {
    rate: Option<f64>,
}

impl DataRate {
    /// The rate of moving `bytes` in `time`. Unknown if there is no time, or it is zero.
    #[must_use]
    pub fn new(bytes: u64, time: Option<Duration>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let rate = time
            .filter(|t| !t.is_zero())
            .map(|t| bytes as f64 / t.as_secs_f64());
        Self { rate }
    }

    /// A rate that could not be measured
    #[must_use]
    pub fn unknown() -> Self {
        Self { rate: None }
    }

    /// Bytes per second, if known
    #[must_use]
    pub fn byte_rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_rate() {
            None => f.write_str("unknown"),
            Some(rate) => rate.human_throughput_bytes().fmt(f),
        }
    }
}
