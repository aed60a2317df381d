//! Benchmark harness error types.
//!
//! Only configuration and output failures surface here. Host- and
//! iteration-scoped failures are logged and never fail a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("At least two hosts are required, got {0}")]
    TooFewHosts(usize),

    #[error("Host {host} must be assigned exactly one model, got {count}")]
    ModelCount { host: String, count: usize },

    #[error("Model {model} is assigned to both {first} and {second}")]
    DuplicateModel {
        model: String,
        first: String,
        second: String,
    },

    #[error("Benchmark count must be at least 1")]
    ZeroIterations,

    #[error("Failed to write results to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read results from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BenchError {
    /// True for errors raised before any host work starts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TooFewHosts(_)
                | Self::ModelCount { .. }
                | Self::DuplicateModel { .. }
                | Self::ZeroIterations
        )
    }
}
