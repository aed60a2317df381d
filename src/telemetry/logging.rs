//! Logging configuration and initialization.
//!
//! Supports JSON and pretty-printed formats with configurable output paths.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (default, suits collected runs).
    #[default]
    Json,
    /// Human-readable pretty printing (interactive use).
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format (JSON or Pretty).
    pub format: LogFormat,
    /// Log level filter (e.g., "info", "debug", "fleet_bench=trace").
    pub level: String,
    /// Optional file path for log output. If None, logs to stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

impl LogConfig {
    /// Build from `RUST_LOG`, `FLEET_BENCH_LOG_FORMAT` and `FLEET_BENCH_LOG_FILE`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("RUST_LOG") {
            if !level.trim().is_empty() {
                config.level = level;
            }
        }
        if let Ok(format) = std::env::var("FLEET_BENCH_LOG_FORMAT") {
            config.format = format.parse().unwrap_or_default();
        }
        if let Ok(path) = std::env::var("FLEET_BENCH_LOG_FILE") {
            if !path.trim().is_empty() {
                config.output_path = Some(PathBuf::from(path));
            }
        }
        config
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Both formats write to `output_path` when set; pretty output to a file carries no ANSI
/// colours. The file is opened before the subscriber is installed. Call once at startup;
/// a second call returns [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let file = config.output_path.as_deref().map(open_log_file).transpose()?;

    match config.format {
        LogFormat::Json => init_json_subscriber(filter, file),
        LogFormat::Pretty => init_pretty_subscriber(filter, file),
    }
}

fn open_log_file(path: &Path) -> Result<File, LogError> {
    File::create(path).map_err(|e| LogError::FileOpen(format!("{}: {}", path.display(), e)))
}

fn init_json_subscriber(filter: EnvFilter, file: Option<File>) -> Result<(), LogError> {
    let registry = tracing_subscriber::registry().with(filter);

    if let Some(file) = file {
        registry
            .with(fmt::layer().json().with_writer(Mutex::new(file)))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
    } else {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
    }

    Ok(())
}

fn init_pretty_subscriber(filter: EnvFilter, file: Option<File>) -> Result<(), LogError> {
    let registry = tracing_subscriber::registry().with(filter);

    if let Some(file) = file {
        registry
            .with(fmt::layer().pretty().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
    } else {
        registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
    }

    Ok(())
}
