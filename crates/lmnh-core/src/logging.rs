//! Subscriber setup for the ETL binaries.
//!
//! Built once at startup from a [`LogConfig`]; library code only uses the
//! `tracing` macros. With `error_file` set, ERROR events are written to
//! `<log_dir>/etl.log` and kept off the console.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const ERROR_LOG_FILE: &str = "etl.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default directive when `RUST_LOG` is unset.
    pub level: Level,
    pub format: LogFormat,
    pub error_file: bool,
    pub log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            error_file: false,
            log_dir: PathBuf::from("."),
        }
    }
}

impl LogConfig {
    /// `LOG_FORMAT` and `LOG_DIR` override the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir.join(ERROR_LOG_FILE)
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file writes are flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let errors_to_file = config.error_file;

    let console = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    }
    .with_filter(env_filter)
    .with_filter(filter_fn(move |meta| {
        !(errors_to_file && *meta.level() == Level::ERROR)
    }));

    let (file, guard) = if errors_to_file {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("failed to create log dir {}", config.log_dir.display()))?;
        let appender = tracing_appender::rolling::never(&config.log_dir, ERROR_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(LevelFilter::ERROR);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
