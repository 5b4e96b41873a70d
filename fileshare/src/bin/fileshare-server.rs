//! fileshare server - main entrypoint
// (c) 2026 fileshare contributors

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::process::ExitCode;

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> ExitCode {
    fileshare::server_cli(std::env::args_os())
}
