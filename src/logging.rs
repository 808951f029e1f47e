//! Process-wide tracing setup for the binary.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR_ENV: &str = "TTJ_LOG_DIR";
pub const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "pipeline.log";
const DEFAULT_FILTER: &str = "ttj_pipeline=info,warn";

/// `TTJ_LOG_DIR`, or `./logs`
pub fn log_dir() -> PathBuf {
    env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

/// `RUST_LOG` when it parses, else the crate at info and everything else at warn
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs JSON lines to a daily file under `dir` plus readable lines on
/// stderr. Only the first call in a process installs a subscriber.
///
/// The file writer flushes when the returned guard drops, so hold it until
/// the program exits.
pub fn init_logging(dir: &Path) -> io::Result<WorkerGuard> {
    fs::create_dir_all(dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("Logging to {}", dir.display());
    }
    Ok(guard)
}
