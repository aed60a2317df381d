//! Cross-bundle comparison.
//!
//! Two front definitions serve two reports and are kept apart on purpose:
//! - [`fleet_pareto_front`]: strict three-way dominance (accuracy, throughput,
//!   latency) over the whole corpus, with relative-to-best ratios.
//! - [`run_tradeoff_front`]: tolerant two-way dominance (accuracy, throughput)
//!   over one run's models, plus a composite score to pick a single winner.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::aggregates::{ComparisonAggregate, DerivedAggregates};
use super::bundle::BundleKey;
use super::loader::BundleMap;
use super::stats::safe_div;

/// Floats closer than this compare equal in the run tradeoff front.
pub const TRADEOFF_EPSILON: f64 = 1e-9;
pub const ACCURACY_WEIGHT: f64 = 0.6;
pub const THROUGHPUT_WEIGHT: f64 = 0.4;

// =============================================================================
// Fleet-wide strict front
// =============================================================================

/// Headline coordinates of one bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankPoint {
    pub accuracy: f64,
    pub throughput: f64,
    pub latency_ms: f64,
}

impl RankPoint {
    pub fn from_aggregates(agg: &DerivedAggregates) -> Self {
        Self {
            accuracy: agg.headline_accuracy(),
            throughput: agg.headline_throughput(),
            latency_ms: agg.headline_latency_ms(),
        }
    }
}

/// `a` dominates `b`: no worse on all three axes, strictly better on one.
///
/// Latency only compares when both sides measured a positive value; otherwise
/// neither dominates.
pub fn strictly_dominates(a: &RankPoint, b: &RankPoint) -> bool {
    if a.latency_ms <= 0.0 || b.latency_ms <= 0.0 {
        return false;
    }
    let no_worse = a.accuracy >= b.accuracy && a.throughput >= b.throughput && a.latency_ms <= b.latency_ms;
    let better = a.accuracy > b.accuracy || a.throughput > b.throughput || a.latency_ms < b.latency_ms;
    no_worse && better
}

/// Front membership for each point, in input order.
pub fn fleet_pareto_front(points: &[RankPoint]) -> Vec<bool> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            !points
                .iter()
                .enumerate()
                .any(|(j, q)| i != j && strictly_dominates(q, p))
        })
        .collect()
}

/// Fill every bundle's `comparison` aggregate. Bundles must already be computed.
pub fn rank_fleet(bundles: &mut BundleMap) {
    let points: Vec<RankPoint> = bundles
        .values()
        .map(|b| b.aggregates.as_ref().map(RankPoint::from_aggregates).unwrap_or_default())
        .collect();
    let efficiency: Vec<f64> = bundles
        .values()
        .map(|b| b.aggregates.as_ref().map_or(0.0, |a| a.efficiency.accuracy_per_second))
        .collect();
    let front = fleet_pareto_front(&points);

    let best_accuracy = points.iter().map(|p| p.accuracy).fold(0.0, f64::max);
    let best_throughput = points.iter().map(|p| p.throughput).fold(0.0, f64::max);
    let best_efficiency = efficiency.iter().copied().fold(0.0, f64::max);
    let best_latency = points
        .iter()
        .map(|p| p.latency_ms)
        .filter(|l| *l > 0.0)
        .fold(f64::INFINITY, f64::min);

    for (i, bundle) in bundles.values_mut().enumerate() {
        let p = points[i];
        let comparison = ComparisonAggregate {
            relative_accuracy: safe_div(p.accuracy, best_accuracy),
            relative_latency: if p.latency_ms > 0.0 {
                best_latency / p.latency_ms
            } else {
                0.0
            },
            relative_throughput: safe_div(p.throughput, best_throughput),
            relative_efficiency: safe_div(efficiency[i], best_efficiency),
            pareto_optimal: front[i],
        };
        bundle.aggregates.get_or_insert_with(Default::default).comparison = Some(comparison);
    }
}

// =============================================================================
// Single-run tolerant front
// =============================================================================

/// One model of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffCandidate {
    pub key: BundleKey,
    pub model: String,
    /// Fraction in `[0, 1]`.
    pub accuracy: f64,
    pub throughput: f64,
    pub accuracy_samples: usize,
}

/// A scored participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffPoint {
    pub key: BundleKey,
    pub model: String,
    pub accuracy_pct: f64,
    pub throughput: f64,
    /// Throughput as a percentage of the best participant's.
    pub throughput_score: f64,
    pub composite: f64,
    pub on_front: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeoffOutcome {
    /// Participants only, in input order.
    pub points: Vec<TradeoffPoint>,
    pub front: Vec<BundleKey>,
    pub best: Option<TradeoffPoint>,
}

/// `a` dominates `b` on (accuracy, throughput) beyond `epsilon` noise.
pub fn tolerantly_dominates(a: &TradeoffCandidate, b: &TradeoffCandidate, epsilon: f64) -> bool {
    let no_worse = a.accuracy >= b.accuracy - epsilon && a.throughput >= b.throughput - epsilon;
    let better = a.accuracy > b.accuracy + epsilon || a.throughput > b.throughput + epsilon;
    no_worse && better
}

/// Tolerant front over candidates with positive throughput and at least one
/// accuracy sample; the best tradeoff is the front member with the highest
/// composite score, ties going to accuracy and then throughput.
pub fn run_tradeoff_front(candidates: &[TradeoffCandidate]) -> TradeoffOutcome {
    let eligible: Vec<&TradeoffCandidate> = candidates
        .iter()
        .filter(|c| c.throughput > 0.0 && c.accuracy_samples > 0)
        .collect();
    let max_throughput = eligible.iter().map(|c| c.throughput).fold(0.0, f64::max);

    let points: Vec<TradeoffPoint> = eligible
        .iter()
        .map(|c| {
            let accuracy_pct = c.accuracy * 100.0;
            let throughput_score = safe_div(c.throughput, max_throughput) * 100.0;
            TradeoffPoint {
                key: c.key.clone(),
                model: c.model.clone(),
                accuracy_pct,
                throughput: c.throughput,
                throughput_score,
                composite: ACCURACY_WEIGHT * accuracy_pct + THROUGHPUT_WEIGHT * throughput_score,
                on_front: !eligible
                    .iter()
                    .any(|other| tolerantly_dominates(other, c, TRADEOFF_EPSILON)),
            }
        })
        .collect();

    let best = points
        .iter()
        .filter(|p| p.on_front)
        .reduce(|best, p| {
            if compare_tradeoff(p, best) == Ordering::Greater {
                p
            } else {
                best
            }
        })
        .cloned();
    let front = points.iter().filter(|p| p.on_front).map(|p| p.key.clone()).collect();

    TradeoffOutcome { points, front, best }
}

fn compare_tradeoff(a: &TradeoffPoint, b: &TradeoffPoint) -> Ordering {
    cmp_tolerant(a.composite, b.composite)
        .then_with(|| cmp_tolerant(a.accuracy_pct, b.accuracy_pct))
        .then_with(|| cmp_tolerant(a.throughput, b.throughput))
}

fn cmp_tolerant(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= TRADEOFF_EPSILON {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(accuracy: f64, throughput: f64, latency_ms: f64) -> RankPoint {
        RankPoint { accuracy, throughput, latency_ms }
    }

    fn candidate(name: &str, accuracy: f64, throughput: f64, samples: usize) -> TradeoffCandidate {
        TradeoffCandidate {
            key: BundleKey::new("gpu1", name),
            model: name.to_string(),
            accuracy,
            throughput,
            accuracy_samples: samples,
        }
    }

    #[test]
    fn test_strict_dominance() {
        let a = point(0.9, 50.0, 1000.0);
        assert!(strictly_dominates(&a, &point(0.8, 50.0, 1000.0)));
        assert!(!strictly_dominates(&a, &a));
        assert!(!strictly_dominates(&a, &point(0.95, 10.0, 5000.0)));
    }

    #[test]
    fn test_strict_dominance_needs_positive_latency() {
        let good = point(1.0, 100.0, 500.0);
        let unmeasured = point(0.1, 1.0, 0.0);
        assert!(!strictly_dominates(&good, &unmeasured));
        assert!(!strictly_dominates(&unmeasured, &good));
        assert_eq!(fleet_pareto_front(&[good, unmeasured]), vec![true, true]);
    }

    #[test]
    fn test_fleet_front() {
        let points = [
            point(0.9, 40.0, 1200.0),
            point(0.7, 80.0, 900.0),
            point(0.6, 30.0, 1500.0), // dominated by both
        ];
        assert_eq!(fleet_pareto_front(&points), vec![true, true, false]);
    }

    #[test]
    fn test_tolerant_dominance_ignores_noise() {
        let a = candidate("a", 0.8, 50.0, 10);
        let b = candidate("b", 0.8 + 1e-12, 50.0 - 1e-12, 10);
        assert!(!tolerantly_dominates(&a, &b, TRADEOFF_EPSILON));
        assert!(!tolerantly_dominates(&b, &a, TRADEOFF_EPSILON));
    }

    #[test]
    fn test_run_front_excludes_ineligible() {
        let outcome = run_tradeoff_front(&[
            candidate("fast", 0.5, 100.0, 4),
            candidate("no-samples", 1.0, 500.0, 0),
            candidate("stalled", 1.0, 0.0, 4),
        ]);
        assert_eq!(outcome.points.len(), 1);
        assert_eq!(outcome.best.as_ref().map(|p| p.model.as_str()), Some("fast"));
        assert!((outcome.points[0].throughput_score - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_run_front_composite_winner() {
        // accurate: 0.6*90 + 0.4*50 = 74; fast: 0.6*60 + 0.4*100 = 76
        let outcome = run_tradeoff_front(&[
            candidate("accurate", 0.9, 50.0, 10),
            candidate("fast", 0.6, 100.0, 10),
            candidate("worse", 0.5, 40.0, 10),
        ]);
        assert_eq!(outcome.front.len(), 2);
        let best = outcome.best.unwrap();
        assert_eq!(best.model, "fast");
        assert!((best.composite - 76.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_front_tie_prefers_accuracy() {
        // a: 0.6*80 + 0.4*50 = 68; b: 0.6*100x + 0.4*100 = 68 at x = 28/60
        let outcome = run_tradeoff_front(&[
            candidate("b", 28.0 / 60.0, 100.0, 10),
            candidate("a", 0.8, 50.0, 10),
        ]);
        assert_eq!(outcome.front.len(), 2);
        assert_eq!(outcome.best.unwrap().model, "a");
    }
}
