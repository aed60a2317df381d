//! Reduction of iterations to average/min/max.

use super::{Iteration, Stats};

/// Average, minimum and maximum over a set of iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregates {
    pub average: Stats,
    pub min: Stats,
    pub max: Stats,
}

/// Reduce iterations field by field.
///
/// An empty slice yields zero-valued aggregates. Token counts average with
/// integer division so `min <= average <= max` holds for every field.
pub fn aggregate(iterations: &[Iteration]) -> Aggregates {
    let Some(first) = iterations.first() else {
        return Aggregates::default();
    };

    let mut min = first.stats;
    let mut max = first.stats;
    let mut total_ms = 0.0;
    let mut ttft_ms = 0.0;
    let mut tps = 0.0;
    let mut input_tokens = 0u64;
    let mut output_tokens = 0u64;

    for Iteration { stats, .. } in iterations {
        min.total_execution_time_ms = min.total_execution_time_ms.min(stats.total_execution_time_ms);
        min.time_to_first_token_ms = min.time_to_first_token_ms.min(stats.time_to_first_token_ms);
        min.tokens_per_second = min.tokens_per_second.min(stats.tokens_per_second);
        min.input_tokens = min.input_tokens.min(stats.input_tokens);
        min.output_tokens = min.output_tokens.min(stats.output_tokens);

        max.total_execution_time_ms = max.total_execution_time_ms.max(stats.total_execution_time_ms);
        max.time_to_first_token_ms = max.time_to_first_token_ms.max(stats.time_to_first_token_ms);
        max.tokens_per_second = max.tokens_per_second.max(stats.tokens_per_second);
        max.input_tokens = max.input_tokens.max(stats.input_tokens);
        max.output_tokens = max.output_tokens.max(stats.output_tokens);

        total_ms += stats.total_execution_time_ms;
        ttft_ms += stats.time_to_first_token_ms;
        tps += stats.tokens_per_second;
        input_tokens += stats.input_tokens;
        output_tokens += stats.output_tokens;
    }

    let n = iterations.len();
    // Rounding in the sum can push a mean of equal values one ulp past the bounds.
    let mean = |sum: f64, lo: f64, hi: f64| (sum / n as f64).clamp(lo, hi);
    let average = Stats {
        total_execution_time_ms: mean(total_ms, min.total_execution_time_ms, max.total_execution_time_ms),
        time_to_first_token_ms: mean(ttft_ms, min.time_to_first_token_ms, max.time_to_first_token_ms),
        tokens_per_second: mean(tps, min.tokens_per_second, max.tokens_per_second),
        input_tokens: input_tokens / n as u64,
        output_tokens: output_tokens / n as u64,
    };

    Aggregates { average, min, max }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iteration(index: usize, total: f64, ttft: f64, tps: f64, input: u64, output: u64) -> Iteration {
        Iteration {
            index,
            stats: Stats {
                total_execution_time_ms: total,
                time_to_first_token_ms: ttft,
                tokens_per_second: tps,
                input_tokens: input,
                output_tokens: output,
            },
        }
    }

    #[test]
    fn test_empty_yields_zero() {
        assert_eq!(aggregate(&[]), Aggregates::default());
    }

    #[test]
    fn test_single_iteration_is_its_own_aggregate() {
        let it = iteration(1, 1200.0, 90.0, 41.5, 20, 50);
        let agg = aggregate(&[it]);
        assert_eq!(agg.average, it.stats);
        assert_eq!(agg.min, it.stats);
        assert_eq!(agg.max, it.stats);
    }

    #[test]
    fn test_fields_reduce_independently() {
        let agg = aggregate(&[
            iteration(1, 1000.0, 120.0, 30.0, 20, 30),
            iteration(2, 2000.0, 80.0, 60.0, 20, 120),
            iteration(3, 1500.0, 100.0, 45.0, 20, 70),
        ]);
        assert_eq!(agg.min.total_execution_time_ms, 1000.0);
        assert_eq!(agg.max.total_execution_time_ms, 2000.0);
        assert_eq!(agg.min.time_to_first_token_ms, 80.0);
        assert_eq!(agg.max.time_to_first_token_ms, 120.0);
        assert!((agg.average.tokens_per_second - 45.0).abs() < 1e-9);
        assert!((agg.average.total_execution_time_ms - 1500.0).abs() < 1e-9);
        assert_eq!(agg.average.output_tokens, 73);
    }

    #[test]
    fn test_min_le_avg_le_max() {
        let its: Vec<Iteration> = (0..17)
            .map(|i| {
                let x = i as f64;
                iteration(i + 1, 800.0 + (x * 37.0) % 400.0, 50.0 + (x * 13.0) % 70.0, 20.0 + (x * 7.0) % 30.0, 10 + i as u64, 40 + (i as u64 * 11) % 60)
            })
            .collect();
        let agg = aggregate(&its);
        let fields = |s: &Stats| {
            [
                s.total_execution_time_ms,
                s.time_to_first_token_ms,
                s.tokens_per_second,
                s.input_tokens as f64,
                s.output_tokens as f64,
            ]
        };
        for ((lo, avg), hi) in fields(&agg.min).iter().zip(fields(&agg.average)).zip(fields(&agg.max)) {
            assert!(*lo <= avg && avg <= hi, "{} <= {} <= {}", lo, avg, hi);
        }
    }
}
