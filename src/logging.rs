//! Opt-in file logging for applications embedding the client.
//!
//! The library only emits `tracing` events (request URIs at `debug`, with
//! the API key redacted). Call `init` or `init_with_dir` once at startup to
//! send them to a daily-rotated file; applications with their own
//! subscriber need neither.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "redmine_client=info,warn";

const FILE_PREFIX: &str = "redmine-client";

/// Log to the platform data directory, e.g.
/// `~/.local/share/redmine-client/logs/` on Linux.
pub fn init() -> anyhow::Result<()> {
    let dir = log_directory().context("could not determine local data directory")?;
    init_with_dir(&dir)
}

/// Log to `dir`, creating it if needed. Levels come from `RUST_LOG`.
///
/// # Errors
///
/// Fails if the directory or log file cannot be created, or if a global
/// subscriber is already installed.
pub fn init_with_dir(dir: &Path) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = file_subscriber(dir, filter)?;
    tracing::subscriber::set_global_default(subscriber)
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %dir.display(),
        "redmine-client logging initialized"
    );
    Ok(())
}

/// Build, without installing, a subscriber writing `redmine-client.<date>.log`
/// files into `dir`.
pub fn file_subscriber(
    dir: &Path,
    filter: EnvFilter,
) -> anyhow::Result<impl Subscriber + Send + Sync> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .context("could not open log file")?;

    Ok(tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter))
}

/// Where `init` puts log files.
pub fn log_directory() -> Option<PathBuf> {
    dirs::data_local_dir().map(|base| base.join(FILE_PREFIX).join("logs"))
}
