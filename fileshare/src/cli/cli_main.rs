//! Main CLI entrypoints for the client and the server
// (c) 2026 fileshare contributors

use std::ffi::OsString;
use std::process::ExitCode;

use super::args::{ClientArgs, ServerArgs};
use crate::{
    cli::styles::{configure_colours, error, use_colours},
    client::MAX_UPDATE_FPS,
    config::{ConfigOverrides, Configuration, Manager},
    util::{ConsoleTraceType, LogSettings},
};

use anyhow::{Context as _, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressDrawTarget};

/// Client CLI entrypoint
///
/// Call this from `main`, passing the arguments to use.
/// Normally you will call `client_cli(std::env::args_os())` but you can pass in alternate arguments for CLI testing.
///
/// # Note
/// This function may start a tokio runtime and perform work in it.
#[must_use]
pub fn client_cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    report(client_inner(args))
}

/// Server CLI entrypoint
///
/// Runs until interrupted by Ctrl-C, then waits for connected clients to leave.
///
/// # Note
/// This function starts a multi-threaded tokio runtime and performs work in it.
#[must_use]
pub fn server_cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    report(server_inner(args))
}

/// Converts an outcome into an exit code, reporting any error
fn report(result: Result<bool>) -> ExitCode {
    #[allow(clippy::match_bool)] // improved readability
    result
        .inspect_err(|e| {
            if crate::util::tracing_is_initialised() {
                tracing::error!("{e:#}");
            } else {
                eprintln!("{ERROR}Error:{ERROR:#} {e:#}", ERROR = error());
            }
        })
        .map_or(ExitCode::FAILURE, |success| match success {
            true => ExitCode::SUCCESS,
            false => ExitCode::FAILURE,
        })
}

/// Parses arguments, handling `--help` and `--version`
///
/// # Return
/// `None` if help or version information was printed.
fn parse_args<P, I, T>(args: I) -> Result<Option<P>>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::error::ErrorKind::{DisplayHelp, DisplayVersion};
    match P::try_parse_from(args) {
        Ok(args) => Ok(Some(args)),
        Err(e) if matches!(e.kind(), DisplayHelp | DisplayVersion) => {
            let message = e.render();
            if use_colours() {
                print!("{}", message.ansi());
            } else {
                print!("{message}");
            }
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// CLIENT ///////////////////////////////////////////////////////////////////

/// Inner client logic
///
/// # Return
/// true indicates success. false indicates a failure that has already been reported.
fn client_inner<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    configure_colours();
    let Some(args) = parse_args::<ClientArgs, _, _>(args)? else {
        return Ok(true); // help/version shown; exit
    };

    let mut manager = Manager::standard();
    manager.merge_provider(args.config.clone());

    if args.config_files {
        println!("{}", config_files_data());
        return Ok(true);
    }
    if args.show_config {
        print!("{}", manager.describe()?);
        return Ok(true);
    }

    // Reject bad configuration before touching the network
    let config = manager.configuration()?;
    run_client(args, config)
}

fn config_files_data() -> String {
    Manager::config_files().join("\n")
}

#[tokio::main(flavor = "current_thread")]
async fn run_client(args: ClientArgs, config: Configuration) -> Result<bool> {
    let display = if args.output.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(MAX_UPDATE_FPS))
    };
    LogSettings::new(
        &args.output,
        ConsoleTraceType::Indicatif(display.clone()),
        config.time_format,
        use_colours(),
    )
    .install()?;

    // this may return false
    crate::client::client_main(&args, &config, display).await
}

// SERVER ///////////////////////////////////////////////////////////////////

fn server_inner<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    configure_colours();
    let Some(args) = parse_args::<ServerArgs, _, _>(args)? else {
        return Ok(true);
    };

    let mut manager = Manager::standard();
    manager.merge_provider(ConfigOverrides {
        time_format: args.time_format,
        ..Default::default()
    });
    let config = manager.configuration()?;
    LogSettings::new(
        &args.output,
        ConsoleTraceType::Standard,
        config.time_format,
        use_colours(),
    )
    .install()?;
    run_server(&args)
}

#[tokio::main]
async fn run_server(args: &ServerArgs) -> Result<bool> {
    crate::server::server_main(&args.address, args.port, args.start_directory.as_deref())
        .await
        .with_context(|| "[Server] failed")?;
    Ok(true)
}
