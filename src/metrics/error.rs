//! Corpus ingestion errors.
//!
//! Any of these fails the whole load pass; a partially loaded corpus would skew
//! every cross-bundle comparison.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed accuracy record at {path}:{line}: {source}")]
    AccuracyLine {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Malformed benchmark file {path}: {source}")]
    Benchmark {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed metadata document {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure persisting a computed report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LoadError {
    /// File the error points at.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. }
            | Self::AccuracyLine { path, .. }
            | Self::Benchmark { path, .. }
            | Self::Metadata { path, .. } => path,
        }
    }
}
