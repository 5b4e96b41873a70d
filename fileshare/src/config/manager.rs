//! Configuration source wrangling
// (c) 2026 fileshare contributors

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use figment::{
    Figment, Provider,
    providers::{Env, Format as _, Toml},
};
use serde::Deserialize;
use tracing::debug;

use super::{BASE_CONFIG_FILENAME, Configuration, ENV_PREFIX, SystemDefault};

/// Processes and merges all possible configuration sources.
///
/// Sources, from lowest to highest priority: hard-wired defaults, the system configuration
/// file, the user configuration file, `FILESHARE_*` environment variables, and anything merged
/// in afterwards (usually the command line).
///
/// Run `fileshare --config-files` to see which files apply on the current platform.
#[derive(Debug)]
pub struct Manager {
    data: Figment,
}

impl Manager {
    /// Constructor. Does not apply the system defaults.
    pub(super) fn new(apply_config_files: bool, apply_env: bool) -> Self {
        let mut new1 = Self {
            data: Figment::new(),
        };
        if apply_config_files {
            new1.add_config("system", system_config_path());
            new1.add_config("user", user_config_path());
        }
        if apply_env {
            new1.merge_provider(Env::prefixed(ENV_PREFIX));
        }
        new1
    }

    /// General constructor for production use
    ///
    /// Applies the system defaults, the configuration files appropriate to the platform and
    /// the current user, and the environment.
    #[must_use]
    pub fn standard() -> Self {
        let mut new1 = Self::new(true, true);
        new1.apply_system_default();
        new1
    }

    /// Testing/internal constructor: system defaults only, no files or environment
    #[must_use]
    #[cfg(test)]
    pub(crate) fn without_files() -> Self {
        let mut new1 = Self::new(false, false);
        new1.apply_system_default();
        new1
    }

    fn add_config(&mut self, what: &str, path: Option<PathBuf>) {
        let Some(path) = path else {
            debug!("no {what} configuration file on this platform");
            return;
        };
        if !path.exists() {
            debug!("{what} configuration file {path:?} not present");
            return;
        }
        self.merge_provider(Toml::file(path));
    }

    /// Returns the list of configuration files we look for, lowest priority first.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [system_config_path(), user_config_path()]
            .into_iter()
            .flatten()
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    /// This uses figment's `merge` operation, which prefers to _replace_ existing items.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the provider in a fused state
    }

    /// Applies the system default settings, at a lower priority than everything else
    pub fn apply_system_default(&mut self) {
        let f = std::mem::take(&mut self.data);
        self.data = f.join(SystemDefault);
    }

    /// Attempts to extract a particular struct from the data.
    pub(crate) fn get<'de, T>(&self) -> Result<T>
    where
        T: Deserialize<'de>,
    {
        Ok(self.data.extract::<T>()?)
    }

    /// Extracts and validates the working [`Configuration`]
    pub fn configuration(&self) -> Result<Configuration> {
        let config = self.get::<Configuration>()?;
        config.validate()?;
        Ok(config)
    }

    /// Describes the working configuration: each field, its value, and where it came from
    pub fn describe(&self) -> Result<String> {
        let config = self.configuration()?;
        let mut out = String::new();
        for (field, value) in config.describe() {
            let source = self
                .data
                .find_metadata(field)
                .map_or_else(String::new, |m| {
                    m.source
                        .as_ref()
                        .map_or_else(|| m.name.to_string(), |s| format!("{} ({s})", m.name))
                });
            let _ = writeln!(out, "{field:<18} {value:<24} {source}");
        }
        Ok(out)
    }
}

/// Path of the system-wide configuration file, if the platform has one
fn system_config_path() -> Option<PathBuf> {
    if cfg!(unix) {
        Some(PathBuf::from("/etc").join(BASE_CONFIG_FILENAME))
    } else {
        std::env::var_os("ProgramData").map(|p| PathBuf::from(p).join(BASE_CONFIG_FILENAME))
    }
}

/// Path of the current user's configuration file
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fileshare").join(BASE_CONFIG_FILENAME))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod test {
    use crate::config::{ConfigOverrides, Configuration, ENV_PREFIX, Manager};
    use crate::util::TimeFormat;

    use assertables::assert_contains;
    use figment::providers::{Env, Format as _, Toml};
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let mgr = Manager::without_files();
        let result = mgr.configuration().unwrap();
        assert_eq!(&result, Configuration::system_default());
    }

    #[test]
    fn cli_beats_file_beats_default() {
        figment::Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "test.toml",
                "chunk_size = 1024\nconnect_timeout = 9\ntime_format = \"UTC\"\n",
            )?;
            let mut mgr = Manager::without_files();
            mgr.merge_provider(Toml::file("test.toml"));
            mgr.merge_provider(ConfigOverrides {
                chunk_size: Some(2048),
                ..Default::default()
            });
            let cfg = mgr.configuration().unwrap();
            assert_eq!(cfg.chunk_size, 2048);
            assert_eq!(cfg.connect_timeout, 9);
            assert_eq!(cfg.time_format, TimeFormat::Utc);
            assert_eq!(cfg.progress_interval, 250);
            Ok(())
        });
    }

    #[test]
    fn environment() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FILESHARE_PROGRESS_INTERVAL", "100");
            let mut mgr = Manager::without_files();
            mgr.merge_provider(Env::prefixed(ENV_PREFIX));
            assert_eq!(mgr.configuration().unwrap().progress_interval, 100);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut mgr = Manager::without_files();
        mgr.merge_provider(ConfigOverrides {
            chunk_size: Some(0),
            ..Default::default()
        });
        assert_contains!(mgr.configuration().unwrap_err().to_string(), "chunk_size");
    }

    #[test]
    fn bad_file_is_reported() {
        figment::Jail::expect_with(|jail| {
            let _ = jail.create_file("test.toml", "connect_timeout = \"soon\"\n")?;
            let mut mgr = Manager::without_files();
            mgr.merge_provider(Toml::file("test.toml"));
            let e = mgr.configuration().unwrap_err();
            assert_contains!(e.to_string(), "connect_timeout");
            Ok(())
        });
    }

    #[test]
    fn describe_names_sources() {
        let mut mgr = Manager::without_files();
        mgr.merge_provider(ConfigOverrides {
            connect_timeout: Some(7),
            ..Default::default()
        });
        let text = mgr.describe().unwrap();
        assert_contains!(text, "connect_timeout");
        assert_contains!(text, "command line");
        assert_contains!(text, "default");
    }

    #[test]
    fn config_file_list() {
        let files = Manager::config_files();
        assert!(files.iter().all(|f| f.ends_with("fileshare.toml")));
    }
}
