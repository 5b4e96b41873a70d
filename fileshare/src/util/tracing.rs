//! Log output for the client and server
// (c) 2026 fileshare contributors

use std::{
    fs::File,
    io::Write,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    sync::{Arc, Mutex},
};

use anyhow::Context as _;
use indicatif::MultiProgress;
use serde::{Deserialize, Serialize, de};
use strum::VariantNames as _;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{
        MakeWriter,
        format::Writer,
        time::{ChronoLocal, ChronoUtc, FormatTime},
    },
    prelude::*,
};

use crate::cli::OutputOptions;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Overrides what goes to the console
const CONSOLE_FILTER_VAR: &str = "RUST_LOG";
/// Overrides what goes to the log file; falls back to the console filter
const FILE_FILTER_VAR: &str = "RUST_LOG_FILE_DETAIL";

/// Log target of this crate, used when no filter variable is set
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Selects the format of log message timestamps
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
    clap::ValueEnum,
    Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Local time, `2026-01-31 17:02:11L`
    #[default]
    Local,
    /// UTC, `2026-01-31 16:02:11Z`
    Utc,
    /// Local time with offset, as [RFC 3339](https://datatracker.ietf.org/doc/html/rfc3339),
    /// `2026-01-31T17:02:11.123456+01:00`
    Rfc3339,
}

// Configuration files are edited by hand, so accept any capitalisation.
impl<'de> Deserialize<'de> for TimeFormat {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| de::Error::unknown_variant(&s, Self::VARIANTS))
    }
}

/// Timestamps log lines according to a [`TimeFormat`]
enum Timestamp {
    Local(ChronoLocal),
    Utc(ChronoUtc),
}

impl From<TimeFormat> for Timestamp {
    fn from(format: TimeFormat) -> Self {
        match format {
            TimeFormat::Local => Self::Local(ChronoLocal::new("%Y-%m-%d %H:%M:%SL".into())),
            TimeFormat::Utc => Self::Utc(ChronoUtc::new("%Y-%m-%d %H:%M:%SZ".into())),
            TimeFormat::Rfc3339 => Self::Local(ChronoLocal::rfc_3339()),
        }
    }
}

impl FormatTime for Timestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        match self {
            Self::Local(t) => t.format_time(w),
            Self::Utc(t) => t.format_time(w),
        }
    }
}

/// Where console log output goes
#[derive(Debug)]
pub(crate) enum ConsoleTraceType {
    /// Straight to stderr (the server)
    Standard,
    /// Through the progress display, so bars are redrawn beneath messages (the client)
    Indicatif(MultiProgress),
    /// Nowhere
    #[allow(dead_code)] // used by tests
    None,
}

/// Log settings, collected from the command line and configuration
#[derive(Debug)]
pub(crate) struct LogSettings<'a> {
    /// Level for our own events when no filter variable is set
    level: &'static str,
    console: ConsoleTraceType,
    file: Option<&'a Path>,
    time_format: TimeFormat,
    /// Colour console output (never the file)
    ansi: bool,
}

/// Computes the default log level from the output options
fn level_for(options: &OutputOptions) -> &'static str {
    if options.debug {
        "debug"
    } else if options.quiet {
        "error"
    } else {
        "info"
    }
}

/// A filter, and whether it came from the environment
struct Filter {
    filter: EnvFilter,
    from_env: bool,
}

impl Filter {
    /// Reads `var` if set; otherwise logs only this crate, at `level`.
    /// A variable that is set but does not parse is an error, not silently ignored.
    fn from_env_or(var: &str, level: &str) -> anyhow::Result<Self> {
        match std::env::var(var) {
            Ok(directives) => {
                let filter = EnvFilter::try_new(&directives)
                    .with_context(|| format!("{var}={directives} was not understood"))?;
                Ok(Self {
                    filter,
                    from_env: true,
                })
            }
            Err(_) => Ok(Self {
                filter: EnvFilter::try_new(format!("{OWN_TARGET}={level}"))?,
                from_env: false,
            }),
        }
    }
}

impl<'a> LogSettings<'a> {
    pub(crate) fn new(
        options: &'a OutputOptions,
        console: ConsoleTraceType,
        time_format: TimeFormat,
        ansi: bool,
    ) -> Self {
        Self {
            level: level_for(options),
            console,
            file: options.log_file.as_deref(),
            time_format,
            ansi,
        }
    }

    /// One formatting layer. Targets are shown only when an environment filter may have
    /// let in events from other crates.
    fn layer<W>(&self, writer: W, filter: Filter, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(filter.from_env)
            .with_ansi(ansi)
            .with_timer(Timestamp::from(self.time_format))
            .with_writer(writer)
            .with_filter(filter.filter)
            .boxed()
    }

    /// Builds the console and file layers without installing them
    fn layers(self) -> anyhow::Result<Vec<BoxedLayer>> {
        let mut layers = Vec::new();
        match &self.console {
            ConsoleTraceType::None => (),
            ConsoleTraceType::Standard => {
                let filter = Filter::from_env_or(CONSOLE_FILTER_VAR, self.level)?;
                layers.push(self.layer(std::io::stderr, filter, self.ansi));
            }
            ConsoleTraceType::Indicatif(display) => {
                let filter = Filter::from_env_or(CONSOLE_FILTER_VAR, self.level)?;
                let writer = Mutex::new(ProgressWriter(display.clone()));
                layers.push(self.layer(writer, filter, self.ansi));
            }
        }

        if let Some(path) = self.file {
            let file = File::create(path)
                .with_context(|| format!("could not create log file {}", path.display()))?;
            let filter = if std::env::var(FILE_FILTER_VAR).is_ok() {
                Filter::from_env_or(FILE_FILTER_VAR, self.level)?
            } else {
                Filter::from_env_or(CONSOLE_FILTER_VAR, self.level)?
            };
            layers.push(self.layer(Arc::new(file), filter, false));
        }
        Ok(layers)
    }

    /// Installs the global subscriber.
    ///
    /// **CAUTION:** If this fails, nothing is logged; the caller must report the error itself.
    ///
    /// Only the first call in a process has any effect.
    pub(crate) fn install(self) -> anyhow::Result<()> {
        if is_installed() {
            tracing::warn!("log output is already set up (ignoring)");
            return Ok(());
        }
        let layers = self.layers()?;
        tracing_subscriber::registry().with(layers).init();
        INSTALLED.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Has [`LogSettings::install`] succeeded in this process?
pub(crate) fn is_installed() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

/// Prints log lines above the progress display
struct ProgressWriter(MultiProgress);

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines() {
            if self.0.is_hidden() {
                eprintln!("{line}");
            } else {
                self.0.println(line)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use indicatif::{MultiProgress, ProgressDrawTarget};
    use pretty_assertions::assert_eq;
    use rusty_fork::rusty_fork_test;
    use std::path::PathBuf;

    use super::{ConsoleTraceType, LogSettings, ProgressWriter, TimeFormat, level_for};
    use crate::cli::OutputOptions;

    #[test]
    fn levels_follow_options() {
        let both = OutputOptions {
            debug: true,
            quiet: true,
            ..Default::default()
        };
        assert_eq!(level_for(&both), "debug");
        let quiet = OutputOptions {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(level_for(&quiet), "error");
        assert_eq!(level_for(&OutputOptions::default()), "info");
    }

    #[test]
    fn time_format_ignores_case() {
        assert_eq!("UTC".parse::<TimeFormat>().unwrap(), TimeFormat::Utc);

        #[derive(Debug, serde::Deserialize)]
        struct Holder {
            tf: TimeFormat,
        }
        let figment = figment::Figment::from(figment::providers::Serialized::defaults(
            std::collections::BTreeMap::from([("tf", "Rfc3339")]),
        ));
        let h: Holder = figment.extract().unwrap();
        assert_eq!(h.tf, TimeFormat::Rfc3339);

        let bad = figment::Figment::from(figment::providers::Serialized::defaults(
            std::collections::BTreeMap::from([("tf", "martian")]),
        ));
        let _ = bad.extract::<Holder>().unwrap_err();
    }

    #[test]
    fn console_only() {
        let options = OutputOptions::default();
        let display = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let settings = LogSettings::new(
            &options,
            ConsoleTraceType::Indicatif(display),
            TimeFormat::Local,
            false,
        );
        assert_eq!(settings.layers().unwrap().len(), 1);
    }

    #[test]
    fn console_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = OutputOptions {
            log_file: Some(dir.path().join("server.log")),
            ..Default::default()
        };
        for format in [TimeFormat::Local, TimeFormat::Utc, TimeFormat::Rfc3339] {
            let settings =
                LogSettings::new(&options, ConsoleTraceType::Standard, format, false);
            assert_eq!(settings.layers().unwrap().len(), 2);
        }
        assert!(dir.path().join("server.log").exists());
    }

    #[test]
    fn unwritable_log_file() {
        let options = OutputOptions {
            log_file: Some(PathBuf::from("/no/such/directory/x.log")),
            ..Default::default()
        };
        let settings = LogSettings::new(&options, ConsoleTraceType::None, TimeFormat::Utc, false);
        assert!(settings.layers().is_err());
    }

    #[test]
    fn hidden_progress_writer_passes_lines_through() {
        use std::io::Write as _;
        let mut writer = ProgressWriter(MultiProgress::with_draw_target(
            ProgressDrawTarget::hidden(),
        ));
        let msg = b"first\nsecond\n";
        assert_eq!(writer.write(msg).unwrap(), msg.len());
        writer.flush().unwrap();
    }

    // these install the global subscriber, so each needs its own process
    rusty_fork_test! {
        #[test]
        fn install_once() {
            let options = OutputOptions::default();
            LogSettings::new(&options, ConsoleTraceType::None, TimeFormat::Utc, false)
                .install()
                .unwrap();
            assert!(super::is_installed());
            LogSettings::new(&options, ConsoleTraceType::None, TimeFormat::Utc, false)
                .install()
                .unwrap();
        }

        #[test]
        fn bad_filter_variable() {
            figment::Jail::expect_with(|jail| {
                jail.set_env("RUST_LOG", "fileshare=notalevel");
                let options = OutputOptions::default();
                let settings =
                    LogSettings::new(&options, ConsoleTraceType::Standard, TimeFormat::Utc, false);
                let Err(e) = settings.layers() else {
                    panic!("an invalid filter was accepted");
                };
                assert!(e.to_string().contains("RUST_LOG"));
                Ok(())
            });
        }
    }
}
