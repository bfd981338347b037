//! Tracing setup.
//!
//! The filter comes from `ADAPTIVE_LOG` when set, otherwise from
//! `[logging].level`. Output goes to stderr unless `[logging].file` names a
//! log file, in which case a non-blocking file writer is installed.

use std::fs;
use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::LoggingConfig;

/// ENV used to set the log filter
pub const FILTER_ENV: &str = "ADAPTIVE_LOG";

static INIT: Once = Once::new();

/// Installs the global subscriber.
///
/// Only the first call has any effect. Keep the returned guard alive for as
/// long as file logging should be flushed.
///
/// # Errors
/// Returns an error if the filter is invalid, the log file cannot be
/// created, or another global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut outcome = Ok(None);
    INIT.call_once(|| {
        outcome = setup(config);
    });
    outcome
}

fn setup(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env = std::env::var(FILTER_ENV).ok();
    let filter = build_filter(env.as_deref(), &config.level)?;

    let Some(path) = config.file.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("install tracing subscriber")?;
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .context("install tracing subscriber")?;

    Ok(Some(guard))
}

/// Env directives win over the configured level; blank env is ignored.
fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter> {
    let directives = env.map(str::trim).filter(|s| !s.is_empty());
    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid {FILTER_ENV} filter: {directives}")),
        None => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid logging level: {level}")),
    }
}
