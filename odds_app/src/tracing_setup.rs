use std::io;
use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Where and how a binary logs
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub app_name: String,
    pub log_dir: PathBuf,
    /// Used when `RUST_LOG` is unset
    pub default_level: Level,
    /// Mirror file output to stdout
    pub stdout: bool,
}

impl LogOptions {
    pub fn new(app_name: &str) -> Self {
        Self { app_name: app_name.to_string(), log_dir: PathBuf::from("./logs"), default_level: Level::INFO, stdout: true }
    }
}

/// Installs the global subscriber: hourly rolling non-blocking file output, optionally mirrored to stdout.
///
/// The returned guard flushes the file writer and must be held for the lifetime of the process.
pub fn init(options: &LogOptions) -> Result<WorkerGuard, TryInitError> {
    let _ = std::fs::create_dir_all(&options.log_dir);

    let file_appender = tracing_appender::rolling::hourly(&options.log_dir, format!("{}.log", options.app_name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::builder().with_default_directive(options.default_level.into()).from_env_lossy();

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(false).compact();
    let stdout_layer = options.stdout.then(|| fmt::layer().with_writer(io::stdout).with_target(true).with_ansi(true).compact());

    tracing_subscriber::registry().with(env_filter).with(file_layer).with(stdout_layer).try_init()?;

    Ok(guard)
}
