//! Fleet benchmark harness and metrics analytics for local LLM inference servers.
//!
//! Answers "which model, on which host/GPU, performs best, and by how much?" in two halves:
//!
//! - [`bench`]: drives N timed streaming probes per host, one worker per host, and writes
//!   min/avg/max aggregates per model to a results file.
//! - [`metrics`]: ingests accuracy logs, raw benchmark runs and metadata documents keyed by
//!   (accelerator, model), computes derived statistics per bundle and ranks bundles against
//!   each other.
//!
//! # Pass ordering
//!
//! Analytics run as three strictly ordered passes: load every file, compute every bundle's
//! aggregates, then compare bundles. No pass observes a partially finished predecessor.

pub mod bench;
pub mod cli;
pub mod config;
pub mod metrics;
pub mod provider;
pub mod telemetry;

pub use bench::{BenchError, BenchmarkHarness, ModelBenchmark, Stats};
pub use config::{BenchConfig, Host, HostKind};
pub use metrics::{analyze, MetricsReport, ModelMetricsBundle};
pub use provider::{ProviderError, StreamingProvider};
