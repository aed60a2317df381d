//! The analytics report and its three passes.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregates::compute;
use super::bundle::{normalize, BundleKey, ModelMetricsBundle};
use super::error::{LoadError, ReportError};
use super::loader::{BundleMap, CorpusDirs, MetricsLoader};
use super::ranking::{rank_fleet, run_tradeoff_front, TradeoffCandidate, TradeoffOutcome};
use crate::telemetry::BenchSpan;

/// Fully computed and ranked bundles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    /// Bundles in key order.
    pub bundles: Vec<ModelMetricsBundle>,
}

/// Mode-B summary of one accelerator's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub accelerator: String,
    #[serde(flatten)]
    pub outcome: TradeoffOutcome,
}

/// Load, compute and rank a corpus.
pub fn analyze(dirs: &CorpusDirs) -> Result<MetricsReport, LoadError> {
    let bundles = {
        let span = BenchSpan::pass("load").entered();
        let bundles = MetricsLoader::load_dirs(dirs)?;
        span.record("bundles", bundles.len() as u64);
        bundles
    };
    Ok(MetricsReport::from_bundles(bundles))
}

/// Second pass: aggregates for every bundle. Runs only on a fully loaded map.
pub fn compute_all(bundles: &mut BundleMap) {
    let span = BenchSpan::pass("compute").entered();
    for bundle in bundles.values_mut() {
        bundle.aggregates = Some(compute(bundle));
    }
    span.record("bundles", bundles.len() as u64);
}

impl MetricsReport {
    /// Run the compute and rank passes over loaded bundles.
    pub fn from_bundles(mut bundles: BundleMap) -> Self {
        compute_all(&mut bundles);
        {
            let span = BenchSpan::pass("rank").entered();
            rank_fleet(&mut bundles);
            span.record("bundles", bundles.len() as u64);
        }
        Self {
            generated_at: Utc::now(),
            bundles: bundles.into_values().collect(),
        }
    }

    pub fn bundle(&self, key: &BundleKey) -> Option<&ModelMetricsBundle> {
        self.bundles.iter().find(|b| &b.key == key)
    }

    /// Distinct accelerators, sorted.
    pub fn accelerators(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.bundles.iter().map(|b| b.key.accelerator.as_str()).collect();
        out.dedup();
        out
    }

    /// Keys of bundles on the fleet-wide strict front.
    pub fn fleet_front(&self) -> Vec<&BundleKey> {
        self.bundles
            .iter()
            .filter(|b| {
                b.aggregates
                    .as_ref()
                    .and_then(|a| a.comparison)
                    .is_some_and(|c| c.pareto_optimal)
            })
            .map(|b| &b.key)
            .collect()
    }

    /// Tolerant front and best tradeoff among one accelerator's models.
    pub fn run_summary(&self, accelerator: &str) -> RunSummary {
        let accelerator = normalize(accelerator);
        let candidates: Vec<TradeoffCandidate> = self
            .bundles
            .iter()
            .filter(|b| b.key.accelerator == accelerator)
            .map(|b| {
                let agg = b.derived();
                TradeoffCandidate {
                    key: b.key.clone(),
                    model: b.model_name.clone(),
                    accuracy: agg.headline_accuracy(),
                    throughput: agg.headline_throughput(),
                    accuracy_samples: agg.accuracy.total,
                }
            })
            .collect();
        RunSummary {
            accelerator,
            outcome: run_tradeoff_front(&candidates),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
