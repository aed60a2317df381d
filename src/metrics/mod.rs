//! Metrics analytics engine.
//!
//! Ingests accuracy logs, benchmark files and metadata documents keyed by
//! (accelerator, model), then runs three strictly ordered passes:
//!
//! 1. load: every file is read into its bundle ([`MetricsLoader`])
//! 2. compute: each bundle's [`DerivedAggregates`] ([`compute_all`])
//! 3. rank: cross-bundle ratios and the fleet Pareto front ([`rank_fleet`])
//!
//! [`analyze`] runs all three. A single run's models can additionally be
//! summarized with [`MetricsReport::run_summary`].

mod aggregates;
mod bundle;
mod error;
mod loader;
mod ranking;
mod records;
mod report;
pub mod stats;

pub use aggregates::{
    compute, AccuracyAggregate, BenchmarkAggregate, BucketAccuracy, ComparisonAggregate,
    CorrelationAggregate, DerivedAggregates, Distributions, EfficiencyAggregate, LatencyAggregate,
    MetadataSummary, ReliabilityAggregate, Spread, StabilityAggregate, ThroughputAggregate,
    TokenSummary, TokenUsageAggregate, INPUT_LENGTH_BUCKET_EDGES, MARGIN_BUCKET_EDGES,
};
pub use bundle::{normalize, BundleKey, ModelMetricsBundle};
pub use error::{LoadError, ReportError};
pub use loader::{parse_accuracy_line, parse_file_key, BundleMap, CorpusDirs, MetricsLoader};
pub use ranking::{
    fleet_pareto_front, rank_fleet, run_tradeoff_front, strictly_dominates, tolerantly_dominates,
    RankPoint, TradeoffCandidate, TradeoffOutcome, TradeoffPoint, ACCURACY_WEIGHT,
    THROUGHPUT_WEIGHT, TRADEOFF_EPSILON,
};
pub use records::{AccuracyRecord, BenchmarkRun, Modalities, ModelMetadataDocument};
pub use report::{analyze, compute_all, MetricsReport, RunSummary};
