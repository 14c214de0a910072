// src/logging.rs
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "nostrhitch";

/// Compact console output plus daily JSON files under `log_dir`.
/// `RUST_LOG` wins over `debug`. Keep the guard alive until exit or the
/// file writer stops flushing.
pub fn init(log_dir: &Path, debug: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (file_writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer).json())
        .try_init()?;

    Ok(guard)
}
