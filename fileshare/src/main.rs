//! fileshare client - main entrypoint
// (c) 2026 fileshare contributors

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::process::ExitCode;

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> ExitCode {
    fileshare::client_cli(std::env::args_os())
}
