//! General utility code that didn't fit anywhere else
//!
//! Note that most of this module is not exported.
// (c) 2026 fileshare contributors

pub(crate) mod dirwalk;
pub(crate) mod path;

mod stats;
pub use stats::DataRate;

mod tracing;
pub use tracing::TimeFormat;
pub(crate) use tracing::{ConsoleTraceType, LogSettings, is_installed as tracing_is_initialised};
