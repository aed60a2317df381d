//! Raw record schemas ingested by the loader.

use serde::{Deserialize, Serialize};

use crate::bench::ModelBenchmark;

/// One correctness probe, one line of an accuracy log.
///
/// `correct` is required. Timings are optional: a record without them counts
/// toward accuracy but is left out of the latency and throughput metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    #[serde(default)]
    pub model: String,
    pub correct: bool,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub margin_of_error: f64,
    #[serde(default, alias = "ttft_ms")]
    pub time_to_first_token_ms: Option<f64>,
    #[serde(default, alias = "total_ms")]
    pub total_duration_ms: Option<f64>,
    #[serde(default)]
    pub tokens_per_second: Option<f64>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub deadline_exceeded: bool,
    /// Configured per-probe timeout; 0 means none.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Per-token log-probabilities, when the backend reported them.
    #[serde(default)]
    pub logprobs: Option<Vec<f64>>,
}

impl AccuracyRecord {
    /// Mean per-token log-probability, if any were recorded.
    pub fn mean_logprob(&self) -> Option<f64> {
        match self.logprobs.as_deref() {
            Some(lp) if !lp.is_empty() => Some(lp.iter().sum::<f64>() / lp.len() as f64),
            _ => None,
        }
    }

    /// Tokens/sec discounted by average token confidence.
    pub fn effective_tokens_per_second(&self) -> Option<f64> {
        Some(self.tokens_per_second? * self.mean_logprob()?.exp())
    }
}

/// One low-level timing sample in llama-bench's JSON layout.
///
/// A run with `n_gen == 0` measures prompt processing; otherwise generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkRun {
    pub build_commit: String,
    pub build_number: u64,
    pub cpu_info: String,
    pub gpu_info: String,
    pub backends: String,
    pub model_filename: String,
    pub model_type: String,
    pub model_size: u64,
    pub model_n_params: u64,
    pub n_prompt: u64,
    pub n_gen: u64,
    pub avg_ns: f64,
    pub stddev_ns: f64,
    pub avg_ts: f64,
    pub stddev_ts: f64,
    pub samples_ns: Vec<f64>,
    pub samples_ts: Vec<f64>,
}

impl BenchmarkRun {
    pub fn is_generation(&self) -> bool {
        self.n_gen > 0
    }

    /// Flatten a harness result into one generation run per iteration.
    pub fn from_model_benchmark(result: &ModelBenchmark) -> Vec<Self> {
        result
            .iterations
            .iter()
            .map(|it| {
                let total_ns = it.stats.total_execution_time_ms * 1e6;
                Self {
                    backends: result.host.clone(),
                    model_filename: result.model.clone(),
                    n_prompt: it.stats.input_tokens,
                    n_gen: it.stats.output_tokens,
                    avg_ns: total_ns,
                    avg_ts: it.stats.tokens_per_second,
                    samples_ns: vec![total_ns],
                    samples_ts: vec![it.stats.tokens_per_second],
                    ..Self::default()
                }
            })
            .collect()
    }
}

/// Input modalities a model accepts besides text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modalities {
    pub vision: bool,
    pub audio: bool,
}

/// Static capability description of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetadataDocument {
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub model_type: Option<String>,
    pub backend: Option<String>,
    pub alias: Option<String>,
    pub path: Option<String>,
    #[serde(alias = "n_ctx")]
    pub context_size: Option<u64>,
    pub modalities: Modalities,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{Iteration, Stats};

    #[test]
    fn test_accuracy_record_sparse_line() {
        let r: AccuracyRecord =
            serde_json::from_str(r#"{"model":"m1","correct":true,"difficulty":2,"ttft_ms":80.5}"#).unwrap();
        assert!(r.correct);
        assert_eq!(r.difficulty, 2.0);
        assert_eq!(r.time_to_first_token_ms, Some(80.5));
        assert_eq!(r.total_duration_ms, None);
        assert_eq!(r.logprobs, None);
        assert_eq!(r.effective_tokens_per_second(), None);
    }

    #[test]
    fn test_accuracy_record_requires_correct_flag() {
        assert!(serde_json::from_str::<AccuracyRecord>("{}").is_err());
        assert!(serde_json::from_str::<AccuracyRecord>(r#"{"modle":"m1","corect":true}"#).is_err());
        assert!(serde_json::from_str::<AccuracyRecord>(r#"{"correct":false}"#).is_ok());
    }

    #[test]
    fn test_effective_throughput_discounts_by_confidence() {
        let r = AccuracyRecord {
            tokens_per_second: Some(40.0),
            logprobs: Some(vec![-0.1, -0.3]),
            ..AccuracyRecord::default()
        };
        let expected = 40.0 * (-0.2f64).exp();
        assert!((r.effective_tokens_per_second().unwrap() - expected).abs() < 1e-12);

        let empty = AccuracyRecord { logprobs: Some(vec![]), ..r };
        assert_eq!(empty.mean_logprob(), None);
    }

    #[test]
    fn test_metadata_type_and_ctx_alias() {
        let doc: ModelMetadataDocument =
            serde_json::from_str(r#"{"type":"llama 1B Q4_K","n_ctx":8192,"modalities":{"vision":true}}"#).unwrap();
        assert_eq!(doc.model_type.as_deref(), Some("llama 1B Q4_K"));
        assert_eq!(doc.context_size, Some(8192));
        assert!(doc.modalities.vision);
        assert!(!doc.modalities.audio);
    }

    #[test]
    fn test_runs_from_harness_result() {
        let mut result = ModelBenchmark::empty("m1", "gpu1", 2);
        result.iterations.push(Iteration {
            index: 1,
            stats: Stats {
                total_execution_time_ms: 2.0,
                time_to_first_token_ms: 0.5,
                tokens_per_second: 30.0,
                input_tokens: 10,
                output_tokens: 60,
            },
        });
        let runs = BenchmarkRun::from_model_benchmark(&result);
        assert_eq!(runs.len(), 1);
        assert!(runs[0].is_generation());
        assert_eq!(runs[0].avg_ns, 2_000_000.0);
        assert_eq!(runs[0].model_filename, "m1");
    }
}
