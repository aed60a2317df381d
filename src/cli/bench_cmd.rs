//! `bench` subcommand: run the harness over the configured fleet.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{truncate, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::bench::{BenchmarkHarness, BenchmarkResults, HarnessOptions};
use crate::config::BenchConfig;
use crate::provider::HttpBackendFactory;

/// Run every host, write the results file and print a summary.
///
/// Returns 2 when the fleet fails validation, 1 when results cannot be written.
pub async fn run(config: &BenchConfig, cancel: CancellationToken) -> i32 {
    let factory = Arc::new(HttpBackendFactory::new(Duration::from_secs(config.request_timeout_secs)));
    let harness = BenchmarkHarness::new(factory, HarnessOptions::from_config(config)).with_cancellation(cancel);

    match harness.run_and_write(&config.hosts).await {
        Ok((path, results)) => {
            print_summary(&results);
            println!("Results written to {}", path.display());
            EXIT_SUCCESS
        }
        Err(e) if e.is_validation() => {
            eprintln!("Error: {}", e);
            EXIT_CONFIG_ERROR
        }
        Err(e) => {
            tracing::error!(error = %e, "benchmark run failed");
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

/// Print one row per model with average and min/max figures.
pub fn print_summary(results: &BenchmarkResults) {
    println!(
        "{:<32} {:<12} {:>6} {:>12} {:>12} {:>10} {:>10}",
        "MODEL", "HOST", "RUNS", "AVG TOK/S", "AVG TTFT ms", "MIN TOK/S", "MAX TOK/S"
    );
    println!("{}", "-".repeat(100));
    for result in results.values() {
        println!(
            "{:<32} {:<12} {:>3}/{:<2} {:>12.2} {:>12.1} {:>10.2} {:>10.2}",
            truncate(&result.model, 31),
            truncate(&result.host, 11),
            result.iterations.len(),
            result.benchmark_count,
            result.average.tokens_per_second,
            result.average.time_to_first_token_ms,
            result.min.tokens_per_second,
            result.max.tokens_per_second,
        );
    }
}
