//! Transfer progress accounting and display
// (c) 2026 fileshare contributors

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::util::DataRate;

/// Maximum update frequency we will use for the progress display
pub(crate) const MAX_UPDATE_FPS: u8 = 20;

/// Number of recent chunks the throughput estimate is smoothed over
pub const THROUGHPUT_SAMPLES: usize = 5;

/// Shortest elapsed time recorded for a chunk
const MIN_SAMPLE_TIME: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct State {
    items_done: u64,
    items_total: u64,
    file_name: String,
    file_done: u64,
    file_total: u64,
    bytes_done: u64,
    samples: [(u64, Duration); THROUGHPUT_SAMPLES],
    next_sample: usize,
    sample_count: usize,
}

/// Running state of a transfer, shared between the transfer and anyone watching it.
///
/// Clones refer to the same state.
#[derive(Clone, Debug, Default)]
pub struct TransferProgress(Arc<Mutex<State>>);

/// A point-in-time copy of a [`TransferProgress`]
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Files and directories finished so far
    pub items_done: u64,
    /// Files and directories discovered so far
    pub items_total: u64,
    /// Name of the file being transferred
    pub file_name: String,
    /// Bytes of the current file transferred
    pub file_done: u64,
    /// Size of the current file
    pub file_total: u64,
    /// Bytes transferred over the whole transfer
    pub bytes_done: u64,
    /// Throughput over the last few chunks
    pub throughput: DataRate,
}

impl TransferProgress {
    /// Creates an empty progress record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic elsewhere can't leave the counters inconsistent enough to matter
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn add_items(&self, count: u64) {
        self.lock().items_total += count;
    }

    pub(crate) fn item_done(&self) {
        self.lock().items_done += 1;
    }

    pub(crate) fn begin_file(&self, name: &str, size: u64) {
        let mut state = self.lock();
        name.clone_into(&mut state.file_name);
        state.file_done = 0;
        state.file_total = size;
    }

    /// Records one chunk of `bytes` which took `elapsed` to move
    pub(crate) fn record_chunk(&self, bytes: u64, elapsed: Duration) {
        let mut state = self.lock();
        state.file_done += bytes;
        state.bytes_done += bytes;
        let slot = state.next_sample;
        state.samples[slot] = (bytes, elapsed.max(MIN_SAMPLE_TIME));
        state.next_sample = (slot + 1) % THROUGHPUT_SAMPLES;
        state.sample_count = (state.sample_count + 1).min(THROUGHPUT_SAMPLES);
    }

    /// Takes a copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        let (bytes, time) = state.samples[..state.sample_count]
            .iter()
            .fold((0u64, Duration::ZERO), |(b, t), (sb, st)| (b + sb, t + *st));
        let throughput = if state.sample_count == 0 {
            DataRate::unknown()
        } else {
            DataRate::new(bytes, Some(time))
        };
        ProgressSnapshot {
            items_done: state.items_done,
            items_total: state.items_total,
            file_name: state.file_name.clone(),
            file_done: state.file_done,
            file_total: state.file_total,
            bytes_done: state.bytes_done,
            throughput,
        }
    }
}

/// A single-line style format for Indicatif which should cover most situations.
///
/// ```text
/// 11111111111111111111111111111111111111111111111111111111111111111111111111111111
/// filename [==========================            ] 3/7 @ 123.4MB/s [70%/1.24GB]
/// fairly-long-filename [====================      ] 3/7 @ 123.4MB/s [70%/1.24GB]
/// 11111111111111111111111111111111111111111111111111111111111111111111111111111111
/// ```
const PROGRESS_STYLE_COMPACT: &str =
    "{msg:.dim} {wide_bar:.cyan} {prefix} [{percent}%/{decimal_total_bytes:.dim}]";

/// Space to allow for everything except the filename
const DATA_AND_PROGRESS: usize = 55;

/// A double-line style format for Indicatif for use when the filename is too long.
///
/// ```text
/// 11111111111111111111111111111111111111111111111111111111111111111111111111111111
/// extremely-long-filename-no-really-very-long                         [70%/1.24GB]
/// [==========================                                  ] 3/7 @ 123.4MB/s
/// 11111111111111111111111111111111111111111111111111111111111111111111111111111111
/// ```
const PROGRESS_STYLE_OVERLONG: &str =
    "{wide_msg:.dim} [{percent}%/{decimal_total_bytes:.dim}]\n{wide_bar:.cyan} {prefix}";

/// Determine and retrieve the appropriate progress style to use
pub(crate) fn style_for(msg_size: usize) -> &'static str {
    let term_width = console::Term::stderr().size().1 as usize; // this returns a reasonable default if it can't detect
    if msg_size + DATA_AND_PROGRESS > term_width {
        PROGRESS_STYLE_OVERLONG
    } else {
        PROGRESS_STYLE_COMPACT
    }
}

/// Renders a [`TransferProgress`] onto a progress bar at a fixed interval, until stopped
#[derive(Debug)]
pub(crate) struct Reporter {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Reporter {
    pub(crate) fn spawn(
        display: &MultiProgress,
        progress: TransferProgress,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let bar = display.add(ProgressBar::new(0));
        let token = stop.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_name = String::new();
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => render(&bar, &progress.snapshot(), &mut last_name),
                }
            }
            render(&bar, &progress.snapshot(), &mut last_name);
            bar.finish_and_clear();
        });
        Self { stop, task }
    }

    /// Stops the display after one final update
    pub(crate) async fn finish(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

fn render(bar: &ProgressBar, snap: &ProgressSnapshot, last_name: &mut String) {
    if *last_name != snap.file_name {
        last_name.clone_from(&snap.file_name);
        if let Ok(style) = ProgressStyle::with_template(style_for(snap.file_name.len())) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(snap.file_name.clone());
    }
    bar.set_length(snap.file_total);
    bar.set_position(snap.file_done);
    bar.set_prefix(format!(
        "{}/{} @ {}",
        snap.items_done, snap.items_total, snap.throughput
    ));
}
