//! Benchmark configuration loading.
//!
//! The fleet is described in a TOML file; a handful of run parameters may be
//! overridden from `FLEET_BENCH_*` environment variables. Invalid override values
//! fall back to the file value without failing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FLEET_BENCH_COUNT` | 5 | Timed iterations per host |
//! | `FLEET_BENCH_RESULTS_DIR` | `results` | Directory for benchmark result files |
//! | `FLEET_BENCH_REQUEST_TIMEOUT` | 300 | Per-request timeout enforced by providers (secs) |
//! | `FLEET_BENCH_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `FLEET_BENCH_LOG_FILE` | unset | Write logs to this file instead of stderr |
//!
//! # File Layout
//!
//! ```toml
//! results_dir = "results"
//! benchmark_count = 5
//!
//! [[hosts]]
//! name = "gpu1"
//! url = "http://10.0.0.11:11434"
//! kind = "ollama"
//! models = ["llama3.2:1b"]
//!
//! [analytics]
//! accuracy_dir = "data/accuracy"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prompt used for every timed probe unless the config supplies one.
pub const DEFAULT_PROMPT: &str =
    "Explain the difference between latency and throughput in three short paragraphs.";

const DEFAULT_BENCHMARK_COUNT: usize = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Host {host}: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Server family a host runs. Decides which API shape the provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Ollama,
    #[serde(alias = "llama.cpp", alias = "llama-cpp", alias = "llama_cpp")]
    LlamaCpp,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::LlamaCpp => write!(f, "llamacpp"),
        }
    }
}

/// One inference server under test. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub url: String,
    pub kind: HostKind,
    #[serde(default)]
    pub models: Vec<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: HostKind, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            models: vec![model.into()],
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Input directories and output path for the analytics pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub accuracy_dir: PathBuf,
    pub benchmark_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub report_path: PathBuf,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            accuracy_dir: PathBuf::from("data/accuracy"),
            benchmark_dir: PathBuf::from("data/benchmarks"),
            metadata_dir: PathBuf::from("data/metadata"),
            report_path: PathBuf::from("report.json"),
        }
    }
}

/// Full benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_benchmark_count")]
    pub benchmark_count: usize,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_benchmark_count() -> usize {
    DEFAULT_BENCHMARK_COUNT
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            benchmark_count: DEFAULT_BENCHMARK_COUNT,
            prompt: default_prompt(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            hosts: Vec::new(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Flat summary of the effective values, for `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub results_dir: String,
    pub benchmark_count: usize,
    pub request_timeout_secs: u64,
    pub prompt_chars: usize,
    pub host_count: usize,
    pub accuracy_dir: String,
    pub benchmark_dir: String,
    pub metadata_dir: String,
    pub report_path: String,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

impl BenchConfig {
    /// Parse a config document and apply environment overrides.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: BenchConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.check_hosts()?;
        Ok(config.with_env_overrides())
    }

    /// Load a config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Apply `FLEET_BENCH_*` overrides and clamp to sane floors.
    pub fn with_env_overrides(mut self) -> Self {
        let count = parse_usize("FLEET_BENCH_COUNT", self.benchmark_count);
        let timeout = parse_u64("FLEET_BENCH_REQUEST_TIMEOUT", self.request_timeout_secs);
        if let Ok(dir) = std::env::var("FLEET_BENCH_RESULTS_DIR") {
            if !dir.trim().is_empty() {
                self.results_dir = PathBuf::from(dir);
            }
        }
        self.benchmark_count = count.max(1);
        self.request_timeout_secs = timeout.max(1);
        self
    }

    /// Structural host checks that hold for every command, not only `bench`.
    fn check_hosts(&self) -> Result<(), ConfigError> {
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(ConfigError::InvalidHost {
                    host: host.url.clone(),
                    reason: "name cannot be empty".into(),
                });
            }
            if !(host.url.starts_with("http://") || host.url.starts_with("https://")) {
                return Err(ConfigError::InvalidHost {
                    host: host.name.clone(),
                    reason: format!("url must be http(s), got {:?}", host.url),
                });
            }
        }
        Ok(())
    }

    /// Look up a host by name.
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            results_dir: self.results_dir.display().to_string(),
            benchmark_count: self.benchmark_count,
            request_timeout_secs: self.request_timeout_secs,
            prompt_chars: self.prompt.chars().count(),
            host_count: self.hosts.len(),
            accuracy_dir: self.analytics.accuracy_dir.display().to_string(),
            benchmark_dir: self.analytics.benchmark_dir.display().to_string(),
            metadata_dir: self.analytics.metadata_dir.display().to_string(),
            report_path: self.analytics.report_path.display().to_string(),
        }
    }
}
