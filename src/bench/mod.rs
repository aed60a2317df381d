//! Concurrent benchmark harness.
//!
//! Runs N timed streaming probes per host, one worker per host, and reduces each
//! model's iterations to average/min/max [`Stats`].

mod aggregate;
mod error;
mod harness;
mod results;

pub use aggregate::{aggregate, Aggregates};
pub use error::BenchError;
pub use harness::{validate_hosts, BenchmarkHarness, HarnessOptions};
pub use results::{load_results, results_path, slugify, write_results};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One measurement sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_execution_time_ms: f64,
    pub time_to_first_token_ms: f64,
    pub tokens_per_second: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One timed probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based probe number; skipped probes leave gaps.
    pub index: usize,
    pub stats: Stats,
}

/// Per-model benchmark result. Immutable once a run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBenchmark {
    pub model: String,
    #[serde(default)]
    pub host: String,
    pub benchmark_count: usize,
    pub average: Stats,
    pub min: Stats,
    pub max: Stats,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
}

impl ModelBenchmark {
    /// A result with no iterations yet.
    pub fn empty(model: impl Into<String>, host: impl Into<String>, benchmark_count: usize) -> Self {
        Self {
            model: model.into(),
            host: host.into(),
            benchmark_count,
            average: Stats::default(),
            min: Stats::default(),
            max: Stats::default(),
            iterations: Vec::new(),
        }
    }

    /// Fill average/min/max from the collected iterations.
    pub fn finalize(&mut self) {
        let Aggregates { average, min, max } = aggregate(&self.iterations);
        self.average = average;
        self.min = min;
        self.max = max;
    }
}

/// Results of one run, keyed by model name.
pub type BenchmarkResults = BTreeMap<String, ModelBenchmark>;
