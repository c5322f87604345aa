use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::cache::path::store_root;

/// Compiler used when a loop descriptor does not name one.
pub const DEFAULT_COMPILER: &str = "cc";

/// Progress threshold used when `DOPING_THRESHOLD` is set without a value.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// `DOPING_VERBOSE` level: 0 warns only, 1 adds info, 2 debug, 3 and up trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Verbosity(pub u8);

impl Verbosity {
    pub fn filter_directive(self) -> &'static str {
        match self.0 {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn parse(raw: &str) -> Self {
        // The variable being present at all means "verbose".
        match raw.trim().parse::<u8>() {
            Ok(level) => Self(level),
            Err(_) => Self(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSettings {
    pub verbosity: Verbosity,
    /// Full `tracing` filter directive; wins over `verbosity`.
    pub directive: Option<String>,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            verbosity: lookup("DOPING_VERBOSE")
                .map(|raw| Verbosity::parse(&raw))
                .unwrap_or_default(),
            directive: lookup("DOPING_LOG").filter(|value| !value.trim().is_empty()),
            file: lookup("DOPING_LOG_FILE")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn filter(&self) -> String {
        self.directive
            .clone()
            .unwrap_or_else(|| self.verbosity.filter_directive().to_string())
    }
}

/// Decides whether a cache miss is worth compiling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SpecializationPolicy {
    /// Specialize every key the first time it is seen.
    #[default]
    Always,
    /// Specialize only while less than this fraction of the loop has run.
    ProgressThreshold(f64),
}

impl SpecializationPolicy {
    pub fn should_specialize(&self, progress: f64) -> bool {
        match self {
            SpecializationPolicy::Always => true,
            SpecializationPolicy::ProgressThreshold(threshold) => progress < *threshold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    pub log: LogSettings,
    pub save_intermediates: bool,
    pub benchmark: bool,
    pub policy: SpecializationPolicy,
    /// Parent of the per-compilation directories; the system temp dir if unset.
    pub work_dir: Option<PathBuf>,
    /// Root of the artifact store; `None` disables it.
    pub artifact_cache: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log = LogSettings::from_vars(&lookup);

        let policy = match lookup("DOPING_THRESHOLD") {
            None => SpecializationPolicy::Always,
            Some(raw) if raw.trim().is_empty() => {
                SpecializationPolicy::ProgressThreshold(DEFAULT_THRESHOLD)
            }
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(threshold) if threshold.is_finite() => {
                    SpecializationPolicy::ProgressThreshold(threshold)
                }
                _ => {
                    warn!(
                        value = raw.as_str(),
                        default = DEFAULT_THRESHOLD,
                        "DOPING_THRESHOLD is not a number, using the default"
                    );
                    SpecializationPolicy::ProgressThreshold(DEFAULT_THRESHOLD)
                }
            },
        };

        let artifact_cache = if flag(lookup("DOPING_CACHE")) {
            let custom = lookup("DOPING_CACHE_DIR")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from);
            Some(store_root(custom.as_deref())?)
        } else {
            None
        };

        Ok(Self {
            log,
            save_intermediates: flag(lookup("DOPING_SAVE_FILES")),
            benchmark: flag(lookup("DOPING_BENCHMARK")),
            policy,
            work_dir: lookup("DOPING_WORK_DIR")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            artifact_cache,
        })
    }
}

/// A toggle is on when present, unless it spells out "off".
fn flag(value: Option<String>) -> bool {
    match value {
        None => false,
        Some(raw) => !matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
    }
}

#[cfg(feature = "toml-config")]
mod file {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use serde::Deserialize;

    use super::{LogSettings, RuntimeConfig, SpecializationPolicy, Verbosity};
    use crate::cache::path::store_root;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    struct ConfigFile {
        verbose: Option<u8>,
        log: Option<String>,
        log_file: Option<PathBuf>,
        save_files: bool,
        benchmark: bool,
        threshold: Option<f64>,
        work_dir: Option<PathBuf>,
        cache: bool,
        cache_dir: Option<PathBuf>,
    }

    impl RuntimeConfig {
        pub fn from_toml_str(text: &str) -> Result<Self> {
            let file: ConfigFile = toml::from_str(text).context("invalid doping configuration")?;
            let artifact_cache = if file.cache {
                Some(store_root(file.cache_dir.as_deref())?)
            } else {
                None
            };
            Ok(Self {
                log: LogSettings {
                    verbosity: Verbosity(file.verbose.unwrap_or_default()),
                    directive: file.log,
                    file: file.log_file,
                },
                save_intermediates: file.save_files,
                benchmark: file.benchmark,
                policy: file
                    .threshold
                    .map_or(SpecializationPolicy::Always, SpecializationPolicy::ProgressThreshold),
                work_dir: file.work_dir,
                artifact_cache,
            })
        }

        pub fn from_toml_file(path: &Path) -> Result<Self> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml_str(&text)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn reads_settings_from_toml() -> Result<()> {
            let config = RuntimeConfig::from_toml_str(
                r#"
                verbose = 2
                save_files = true
                threshold = 0.25
                cache = true
                cache_dir = "/tmp/doping-store"
                "#,
            )?;
            assert_eq!(config.log.verbosity, Verbosity(2));
            assert!(config.save_intermediates);
            assert_eq!(config.policy, SpecializationPolicy::ProgressThreshold(0.25));
            assert_eq!(
                config.artifact_cache,
                Some(PathBuf::from("/tmp/doping-store"))
            );
            Ok(())
        }

        #[test]
        fn unknown_keys_are_rejected() {
            assert!(RuntimeConfig::from_toml_str("verbosity = 3").is_err());
        }
    }
}
