//! Harness counters and histograms on the `metrics` facade.

const ITERATIONS: &str = "fleet_bench_iterations_total";
const ITERATION_FAILURES: &str = "fleet_bench_iteration_failures_total";
const HOST_FAILURES: &str = "fleet_bench_host_failures_total";
const TTFT_MS: &str = "fleet_bench_ttft_ms";
const TOTAL_MS: &str = "fleet_bench_total_ms";

/// Register metric descriptions with whichever recorder is installed.
pub fn describe_metrics() {
    ::metrics::describe_counter!(ITERATIONS, "Completed benchmark iterations");
    ::metrics::describe_counter!(ITERATION_FAILURES, "Benchmark iterations skipped after a stream failure");
    ::metrics::describe_counter!(HOST_FAILURES, "Hosts whose benchmark loop aborted before timing");
    ::metrics::describe_histogram!(TTFT_MS, "Time to first token per iteration (ms)");
    ::metrics::describe_histogram!(TOTAL_MS, "Total execution time per iteration (ms)");
}

pub fn record_iteration_success(model: &str, ttft_ms: f64, total_ms: f64) {
    ::metrics::counter!(ITERATIONS, "model" => model.to_string()).increment(1);
    ::metrics::histogram!(TTFT_MS, "model" => model.to_string()).record(ttft_ms);
    ::metrics::histogram!(TOTAL_MS, "model" => model.to_string()).record(total_ms);
}

pub fn record_iteration_failure(model: &str) {
    ::metrics::counter!(ITERATION_FAILURES, "model" => model.to_string()).increment(1);
}

pub fn record_host_failure(host: &str) {
    ::metrics::counter!(HOST_FAILURES, "host" => host.to_string()).increment(1);
}
