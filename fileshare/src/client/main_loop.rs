//! Main client mode event loop
// (c) 2026 fileshare contributors

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context as _, Result, anyhow, bail};
use human_repr::{HumanCount as _, HumanDuration as _};
use indicatif::MultiProgress;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace_span, warn};

use super::progress::Reporter;
use super::{Client, RemoteFileSystem, Transfer, TransferOutcome};
use crate::cli::{ClientArgs, ClientCommand};
use crate::config::Configuration;
use crate::protocol::{FileStat, Response};
use crate::util::DataRate;
use crate::util::path::is_plain_name;

/// Bails out if the server refused a request
fn require<R: Response>(response: R, what: &str) -> Result<R> {
    if response.success() {
        Ok(response)
    } else {
        Err(anyhow!("{what}: the server reported failure"))
    }
}

/// Formats one line of a directory listing
fn listing_line(item: &FileStat) -> String {
    if item.is_directory {
        format!("d {:>10} {}", "", item.path)
    } else {
        let size = u64::try_from(item.size).unwrap_or_default();
        format!("- {:>10} {}", size.human_count_bytes().to_string(), item.path)
    }
}

/// Main client mode event loop
///
/// # Return value
/// `true` if the requested operation succeeded; `false` if a transfer was cancelled.
///
/// Command output goes to stdout. Progress and log messages go to stderr via `display`.
pub(crate) async fn client_main(
    args: &ClientArgs,
    config: &Configuration,
    display: MultiProgress,
) -> Result<bool> {
    let (Some(host), Some(port)) = (args.host.as_deref(), args.port) else {
        bail!("a server host and port are required");
    };
    let Some(command) = &args.command else {
        bail!("no command given (try --help)");
    };
    let _guard = trace_span!("CLIENT").entered();

    let mut client = Client::with_connect_timeout(config.connect_timeout_duration());
    client.connect(host, port).await?;

    if let Some(dir) = &args.cwd {
        let _ = require(client.change_directory(dir).await?, &format!("cd {dir}"))?;
    }

    let result = run_command(&mut client, command, config, &display, args.output.quiet).await;
    client.disconnect();
    result
}

async fn run_command<C: RemoteFileSystem>(
    client: &mut C,
    command: &ClientCommand,
    config: &Configuration,
    display: &MultiProgress,
    quiet: bool,
) -> Result<bool> {
    match command {
        ClientCommand::Ls { path } => {
            let path = path.as_deref().unwrap_or_default();
            let listing = require(client.list(path).await?, &format!("ls {path}"))?;
            for item in &listing.items {
                println!("{}", listing_line(item));
            }
        }
        ClientCommand::Pwd => {
            let cwd = require(client.get_current_directory().await?, "pwd")?;
            println!("{}", cwd.path);
        }
        ClientCommand::Mkdir { path } => {
            let made = require(client.make_directory(path).await?, &format!("mkdir {path}"))?;
            debug!("created {}", made.path);
        }
        ClientCommand::Mv {
            source,
            destination,
        } => {
            let _ = require(
                client.rename(source, destination).await?,
                &format!("mv {source} {destination}"),
            )?;
        }
        ClientCommand::Rm { recursive, path } => {
            let _ = require(
                client.remove(path, *recursive).await?,
                &format!("rm {path}"),
            )?;
        }
        ClientCommand::Size { path } => {
            let size = require(client.get_file_size(path).await?, &format!("size {path}"))?;
            println!("{}", size.size);
        }
        ClientCommand::Separator => {
            let cfg = require(client.get_config().await?, "separator")?;
            println!("{}", cfg.path_separator);
        }
        ClientCommand::Get { remote, local } => {
            return get(client, remote, local.as_deref(), config, display, quiet).await;
        }
        ClientCommand::Put { local, remote } => {
            return put(client, local, remote.as_deref(), config, display, quiet).await;
        }
    }
    Ok(true)
}

/// Cancels `token` on Ctrl-C, until the returned guard is dropped
fn cancel_on_interrupt(token: CancellationToken) -> tokio_util::task::AbortOnDropHandle<()> {
    tokio_util::task::AbortOnDropHandle::new(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling");
            token.cancel();
        }
    }))
}

/// Works out where a download lands locally
fn download_target(stat: &FileStat, local: Option<&Path>) -> Result<PathBuf> {
    match local {
        Some(dir) if dir.is_dir() => {
            if !is_plain_name(&stat.path) {
                bail!("cannot derive a local name from {}", stat.full_path);
            }
            Ok(dir.join(&stat.path))
        }
        Some(path) => Ok(path.to_path_buf()),
        None if is_plain_name(&stat.path) => Ok(PathBuf::from(&stat.path)),
        None => bail!("cannot derive a local name from {}; give one", stat.full_path),
    }
}

async fn get<C: RemoteFileSystem>(
    client: &mut C,
    remote: &str,
    local: Option<&Path>,
    config: &Configuration,
    display: &MultiProgress,
    quiet: bool,
) -> Result<bool> {
    let token = CancellationToken::new();
    let _interrupt = cancel_on_interrupt(token.clone());
    let mut transfer = Transfer::with_cancellation(client, config.chunk_size, token);
    let stat = transfer.remote_stat(remote).await?;
    let destination = download_target(&stat, local)?;
    info!("downloading {remote} to {}", destination.display());

    let started = Instant::now();
    let reporter = (!quiet).then(|| {
        Reporter::spawn(display, transfer.progress(), config.progress_interval_duration())
    });
    let result = transfer.download(&stat, &destination).await;
    if let Some(r) = reporter {
        r.finish().await;
    }
    let outcome = result.with_context(|| format!("downloading {remote}"))?;
    Ok(report(outcome, transfer.progress().snapshot().bytes_done, started))
}

async fn put<C: RemoteFileSystem>(
    client: &mut C,
    local: &Path,
    remote: Option<&str>,
    config: &Configuration,
    display: &MultiProgress,
    quiet: bool,
) -> Result<bool> {
    let remote = match remote {
        Some(r) => r.to_string(),
        None => local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("cannot derive a remote name from {}; give one", local.display()))?
            .to_string(),
    };
    info!("uploading {} to {remote}", local.display());

    let token = CancellationToken::new();
    let _interrupt = cancel_on_interrupt(token.clone());
    let mut transfer = Transfer::with_cancellation(client, config.chunk_size, token);
    let started = Instant::now();
    let reporter = (!quiet).then(|| {
        Reporter::spawn(display, transfer.progress(), config.progress_interval_duration())
    });
    let result = transfer.upload(local, &remote).await;
    if let Some(r) = reporter {
        r.finish().await;
    }
    let outcome = result.with_context(|| format!("uploading {}", local.display()))?;
    Ok(report(outcome, transfer.progress().snapshot().bytes_done, started))
}

fn report(outcome: TransferOutcome, bytes: u64, started: Instant) -> bool {
    let elapsed = started.elapsed();
    match outcome {
        TransferOutcome::Completed => {
            info!(
                "transferred {} in {} ({})",
                bytes.human_count_bytes(),
                elapsed.human_duration(),
                DataRate::new(bytes, Some(elapsed))
            );
            true
        }
        TransferOutcome::Cancelled => {
            warn!(
                "transfer cancelled after {}",
                bytes.human_count_bytes()
            );
            false
        }
    }
}
