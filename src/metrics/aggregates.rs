//! Derived statistics for one bundle.
//!
//! [`compute`] is a pure function of a bundle's raw records. The `comparison`
//! category needs every other bundle and is filled later by the ranking pass.

use serde::{Deserialize, Serialize};

use super::bundle::ModelMetricsBundle;
use super::records::{AccuracyRecord, BenchmarkRun, ModelMetadataDocument};
use super::stats::{
    coefficient_of_variation, mean, pearson, percentile, safe_div, sample_stddev,
    DistributionSummary, PercentileSummary,
};

/// Upper edges of the margin-of-error buckets; the last bucket is open-ended.
pub const MARGIN_BUCKET_EDGES: &[f64] = &[0.0, 0.5, 1.0, 2.0, 5.0];
/// Upper edges of the input-length buckets, in tokens.
pub const INPUT_LENGTH_BUCKET_EDGES: &[u64] = &[256, 1024, 4096, 8192];

// =============================================================================
// Categories
// =============================================================================

/// Accuracy over one slice of the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketAccuracy {
    pub label: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

impl BucketAccuracy {
    fn from_records<'a>(label: String, records: impl IntoIterator<Item = &'a AccuracyRecord>) -> Self {
        let (total, correct) = records
            .into_iter()
            .fold((0usize, 0usize), |(t, c), r| (t + 1, c + usize::from(r.correct)));
        Self {
            label,
            total,
            correct,
            accuracy: safe_div(correct as f64, total as f64),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyAggregate {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub error_rate: f64,
    pub avg_difficulty: f64,
    pub margin_of_error: PercentileSummary,
    pub by_difficulty: Vec<BucketAccuracy>,
    pub by_margin: Vec<BucketAccuracy>,
    pub by_input_length: Vec<BucketAccuracy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyAggregate {
    pub ttft_ms: PercentileSummary,
    pub total_ms: PercentileSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputAggregate {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    /// Mean confidence-adjusted tokens/sec over records carrying log-probabilities.
    pub effective_tokens_per_second: Option<f64>,
    pub effective_samples: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
}

impl TokenSummary {
    fn from_values(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            median: percentile(values, 50.0),
            p90: percentile(values, 90.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageAggregate {
    pub input: TokenSummary,
    pub output: TokenSummary,
    /// Input plus output tokens per second of summed wall-clock time.
    pub tokens_per_wall_second: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityAggregate {
    pub deadline_exceeded: usize,
    pub deadline_exceeded_rate: f64,
    pub timed_probes: usize,
    pub timed_probe_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distributions {
    pub ttft_ms: DistributionSummary,
    pub total_ms: DistributionSummary,
    pub tokens_per_second: DistributionSummary,
    pub effective_tokens_per_second: DistributionSummary,
    pub input_tokens: DistributionSummary,
    pub output_tokens: DistributionSummary,
    pub margin_of_error: DistributionSummary,
    pub log_probability: DistributionSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub stddev: f64,
    pub cv: f64,
}

impl Spread {
    fn from_values(values: &[f64]) -> Self {
        Self {
            stddev: sample_stddev(values),
            cv: coefficient_of_variation(values),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityAggregate {
    pub tokens_per_second: Spread,
    pub ttft_ms: Spread,
    pub total_ms: Spread,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyAggregate {
    pub accuracy_per_second: f64,
    pub accuracy_per_output_token: f64,
    /// First nonzero `model_n_params` among the benchmark runs.
    pub parameter_count: u64,
    pub tokens_per_second_per_param: f64,
    pub latency_ms_per_param: f64,
    /// The per-parameter ratios scaled to billions of parameters.
    pub tokens_per_second_per_billion_params: f64,
    pub latency_ms_per_billion_params: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAggregate {
    pub correct_vs_ttft: f64,
    pub correct_vs_throughput: f64,
    pub correct_vs_total_ms: f64,
    pub margin_vs_difficulty: f64,
    pub ttft_vs_input_tokens: f64,
    pub total_ms_vs_output_tokens: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkAggregate {
    pub runs: usize,
    pub prompt_tokens_per_second: f64,
    pub generation_tokens_per_second: f64,
    /// Mean `avg_ns` of generation runs, in milliseconds.
    pub generation_latency_ms: f64,
    pub sample_mean_ns: f64,
    pub sample_stddev_ns: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub backend: Option<String>,
    pub model_type: Option<String>,
    pub alias: Option<String>,
    pub path: Option<String>,
    pub context_size: Option<u64>,
    pub vision: bool,
    pub audio: bool,
}

/// Position of a bundle relative to the rest of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonAggregate {
    pub relative_accuracy: f64,
    /// `best / self`, since lower latency is better.
    pub relative_latency: f64,
    pub relative_throughput: f64,
    pub relative_efficiency: f64,
    pub pareto_optimal: bool,
}

/// Every derived statistic for one bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedAggregates {
    pub accuracy: AccuracyAggregate,
    pub latency: LatencyAggregate,
    pub throughput: ThroughputAggregate,
    pub tokens: TokenUsageAggregate,
    pub reliability: ReliabilityAggregate,
    pub distributions: Distributions,
    pub stability: StabilityAggregate,
    pub efficiency: EfficiencyAggregate,
    pub correlation: CorrelationAggregate,
    pub benchmark: BenchmarkAggregate,
    pub metadata: MetadataSummary,
    pub comparison: Option<ComparisonAggregate>,
}

impl DerivedAggregates {
    pub fn headline_accuracy(&self) -> f64 {
        self.accuracy.accuracy
    }

    /// Accuracy-probe throughput, else benchmark generation throughput.
    pub fn headline_throughput(&self) -> f64 {
        if self.throughput.mean > 0.0 {
            self.throughput.mean
        } else {
            self.benchmark.generation_tokens_per_second
        }
    }

    /// Mean total duration of accuracy probes, else of generation runs.
    pub fn headline_latency_ms(&self) -> f64 {
        if self.latency.total_ms.mean > 0.0 {
            self.latency.total_ms.mean
        } else {
            self.benchmark.generation_latency_ms
        }
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Compute every category except `comparison`.
pub fn compute(bundle: &ModelMetricsBundle) -> DerivedAggregates {
    let records = &bundle.accuracy;
    let col = |f: fn(&AccuracyRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
    let present =
        |f: fn(&AccuracyRecord) -> Option<f64>| -> Vec<f64> { records.iter().filter_map(f).collect() };

    let ttft = present(|r| r.time_to_first_token_ms);
    let total_ms = present(|r| r.total_duration_ms);
    let tps = present(|r| r.tokens_per_second);
    let input = col(|r| r.input_tokens as f64);
    let output = col(|r| r.output_tokens as f64);
    let margin = col(|r| r.margin_of_error);
    let difficulty = col(|r| r.difficulty);
    let effective = present(AccuracyRecord::effective_tokens_per_second);
    let logprob = present(AccuracyRecord::mean_logprob);

    let accuracy = accuracy_aggregate(records, &margin, &difficulty);
    let latency = LatencyAggregate {
        ttft_ms: PercentileSummary::from_values(&ttft),
        total_ms: PercentileSummary::from_values(&total_ms),
    };
    let throughput = throughput_aggregate(&tps, &effective);
    let benchmark = benchmark_aggregate(&bundle.benchmarks);

    // Only probes with a measured duration contribute to the wall-clock rate.
    let (timed_tokens, timed_ms) = records
        .iter()
        .filter_map(|r| r.total_duration_ms.map(|ms| ((r.input_tokens + r.output_tokens) as f64, ms)))
        .fold((0.0, 0.0), |(t, ms), (rt, rms)| (t + rt, ms + rms));
    let tokens = TokenUsageAggregate {
        input: TokenSummary::from_values(&input),
        output: TokenSummary::from_values(&output),
        tokens_per_wall_second: safe_div(timed_tokens, timed_ms / 1000.0),
    };

    let deadline_exceeded = records.iter().filter(|r| r.deadline_exceeded).count();
    let timed_probes = records.iter().filter(|r| r.timeout_ms > 0).count();
    let reliability = ReliabilityAggregate {
        deadline_exceeded,
        deadline_exceeded_rate: safe_div(deadline_exceeded as f64, records.len() as f64),
        timed_probes,
        timed_probe_rate: safe_div(timed_probes as f64, records.len() as f64),
    };

    let distributions = Distributions {
        ttft_ms: DistributionSummary::from_values(&ttft),
        total_ms: DistributionSummary::from_values(&total_ms),
        tokens_per_second: DistributionSummary::from_values(&tps),
        effective_tokens_per_second: DistributionSummary::from_values(&effective),
        input_tokens: DistributionSummary::from_values(&input),
        output_tokens: DistributionSummary::from_values(&output),
        margin_of_error: DistributionSummary::from_values(&margin),
        log_probability: DistributionSummary::from_values(&logprob),
    };

    let stability = StabilityAggregate {
        tokens_per_second: Spread::from_values(&tps),
        ttft_ms: Spread::from_values(&ttft),
        total_ms: Spread::from_values(&total_ms),
    };

    let correct = |r: &AccuracyRecord| Some(if r.correct { 1.0 } else { 0.0 });
    let correlation = CorrelationAggregate {
        correct_vs_ttft: paired_pearson(records, correct, |r| r.time_to_first_token_ms),
        correct_vs_throughput: paired_pearson(records, correct, |r| r.tokens_per_second),
        correct_vs_total_ms: paired_pearson(records, correct, |r| r.total_duration_ms),
        margin_vs_difficulty: pearson(&margin, &difficulty),
        ttft_vs_input_tokens: paired_pearson(records, |r| r.time_to_first_token_ms, |r| {
            Some(r.input_tokens as f64)
        }),
        total_ms_vs_output_tokens: paired_pearson(records, |r| r.total_duration_ms, |r| {
            Some(r.output_tokens as f64)
        }),
    };

    let mut derived = DerivedAggregates {
        accuracy,
        latency,
        throughput,
        tokens,
        reliability,
        distributions,
        stability,
        efficiency: EfficiencyAggregate::default(),
        correlation,
        benchmark,
        metadata: metadata_summary(bundle.metadata.as_ref(), &bundle.benchmarks),
        comparison: None,
    };
    derived.efficiency = efficiency_aggregate(&derived, &bundle.benchmarks);
    derived
}

/// Pearson correlation over the records where both sides are present.
fn paired_pearson(
    records: &[AccuracyRecord],
    x: impl Fn(&AccuracyRecord) -> Option<f64>,
    y: impl Fn(&AccuracyRecord) -> Option<f64>,
) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = records.iter().filter_map(|r| Some((x(r)?, y(r)?))).unzip();
    pearson(&xs, &ys)
}

fn accuracy_aggregate(records: &[AccuracyRecord], margin: &[f64], difficulty: &[f64]) -> AccuracyAggregate {
    let total = records.len();
    let correct = records.iter().filter(|r| r.correct).count();
    let accuracy = safe_div(correct as f64, total as f64);

    let mut levels = difficulty.to_vec();
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup();
    let by_difficulty = levels
        .iter()
        .map(|level| {
            BucketAccuracy::from_records(
                level.to_string(),
                records.iter().filter(|r| r.difficulty == *level),
            )
        })
        .collect();

    AccuracyAggregate {
        total,
        correct,
        accuracy,
        error_rate: if total == 0 { 0.0 } else { 1.0 - accuracy },
        avg_difficulty: mean(difficulty),
        margin_of_error: PercentileSummary::from_values(margin),
        by_difficulty,
        by_margin: bucketize(records, MARGIN_BUCKET_EDGES, |r| r.margin_of_error),
        by_input_length: bucketize(records, INPUT_LENGTH_BUCKET_EDGES, |r| r.input_tokens),
    }
}

/// Split records into `<=edge` buckets plus one `>last` bucket. Every bucket is
/// reported, empty or not.
fn bucketize<T>(records: &[AccuracyRecord], edges: &[T], value: impl Fn(&AccuracyRecord) -> T) -> Vec<BucketAccuracy>
where
    T: PartialOrd + Copy + ToString,
{
    let bucket_of = |v: T| edges.iter().position(|edge| v <= *edge).unwrap_or(edges.len());
    let mut buckets: Vec<BucketAccuracy> = edges
        .iter()
        .map(|edge| format!("<={}", edge.to_string()))
        .chain(edges.last().map(|edge| format!(">{}", edge.to_string())))
        .map(|label| BucketAccuracy {
            label,
            ..BucketAccuracy::default()
        })
        .collect();

    for record in records {
        let bucket = &mut buckets[bucket_of(value(record))];
        bucket.total += 1;
        bucket.correct += usize::from(record.correct);
    }
    for bucket in &mut buckets {
        bucket.accuracy = safe_div(bucket.correct as f64, bucket.total as f64);
    }
    buckets
}

fn throughput_aggregate(tps: &[f64], effective: &[f64]) -> ThroughputAggregate {
    let summary = DistributionSummary::from_values(tps);
    ThroughputAggregate {
        mean: summary.mean,
        min: summary.min,
        max: summary.max,
        median: summary.p50,
        p90: summary.p90,
        p95: summary.p95,
        p99: summary.p99,
        effective_tokens_per_second: (!effective.is_empty()).then(|| mean(effective)),
        effective_samples: effective.len(),
    }
}

fn benchmark_aggregate(runs: &[BenchmarkRun]) -> BenchmarkAggregate {
    let (generation, prompt): (Vec<&BenchmarkRun>, Vec<&BenchmarkRun>) =
        runs.iter().partition(|r| r.is_generation());
    let samples: Vec<f64> = runs.iter().flat_map(|r| r.samples_ns.iter().copied()).collect();
    let avg = |rs: &[&BenchmarkRun], f: fn(&BenchmarkRun) -> f64| mean(&rs.iter().map(|r| f(r)).collect::<Vec<_>>());

    BenchmarkAggregate {
        runs: runs.len(),
        prompt_tokens_per_second: avg(&prompt[..], |r| r.avg_ts),
        generation_tokens_per_second: avg(&generation[..], |r| r.avg_ts),
        generation_latency_ms: avg(&generation[..], |r| r.avg_ns) / 1e6,
        sample_mean_ns: mean(&samples),
        sample_stddev_ns: sample_stddev(&samples),
    }
}

fn efficiency_aggregate(derived: &DerivedAggregates, runs: &[BenchmarkRun]) -> EfficiencyAggregate {
    let parameter_count = runs.iter().map(|r| r.model_n_params).find(|p| *p > 0).unwrap_or(0);
    let params = parameter_count as f64;
    let billions = params / 1e9;
    let accuracy = derived.headline_accuracy();
    EfficiencyAggregate {
        accuracy_per_second: safe_div(accuracy, derived.latency.total_ms.mean / 1000.0),
        accuracy_per_output_token: safe_div(accuracy, derived.tokens.output.mean),
        parameter_count,
        tokens_per_second_per_param: safe_div(derived.headline_throughput(), params),
        latency_ms_per_param: safe_div(derived.headline_latency_ms(), params),
        tokens_per_second_per_billion_params: safe_div(derived.headline_throughput(), billions),
        latency_ms_per_billion_params: safe_div(derived.headline_latency_ms(), billions),
    }
}

/// Metadata document fields, with benchmark-reported type and backend as fallback.
fn metadata_summary(doc: Option<&ModelMetadataDocument>, runs: &[BenchmarkRun]) -> MetadataSummary {
    let first_nonempty = |f: fn(&BenchmarkRun) -> &str| {
        runs.iter().map(f).find(|s| !s.is_empty()).map(str::to_string)
    };
    let doc = doc.cloned().unwrap_or_default();
    MetadataSummary {
        backend: doc.backend.or_else(|| first_nonempty(|r| r.backends.as_str())),
        model_type: doc.model_type.or_else(|| first_nonempty(|r| r.model_type.as_str())),
        alias: doc.alias,
        path: doc.path,
        context_size: doc.context_size,
        vision: doc.modalities.vision,
        audio: doc.modalities.audio,
    }
}
