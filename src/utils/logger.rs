use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LogSettings;

/// Installs the global `tracing` subscriber.
///
/// Fails only when the log file cannot be opened. If a subscriber is
/// already installed the existing one is kept. An unusable `DOPING_LOG`
/// directive falls back to the verbosity level.
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    let (filter, rejected) = build_filter(settings);

    let (writer, ansi) = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();

    if let Some(directive) = rejected {
        warn!(
            directive = directive.as_str(),
            fallback = settings.verbosity.filter_directive(),
            "invalid DOPING_LOG filter, using the verbosity level"
        );
    }

    Ok(())
}

/// The filter to install, plus the directive that had to be dropped.
fn build_filter(settings: &LogSettings) -> (EnvFilter, Option<String>) {
    let fallback = || EnvFilter::new(settings.verbosity.filter_directive());
    match &settings.directive {
        Some(directive) => match EnvFilter::try_new(directive) {
            Ok(filter) => (filter, None),
            Err(_) => (fallback(), Some(directive.clone())),
        },
        None => (fallback(), None),
    }
}
