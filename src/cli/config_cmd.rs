//! Config CLI subcommands: show, validate.
//!
//! Neither command contacts a host.

use super::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use crate::bench::validate_hosts;
use crate::config::{BenchConfig, EffectiveConfig};

/// Print the effective config as key-value pairs, then the host table.
pub fn run_show(config: &BenchConfig) -> i32 {
    print_config(&config.effective_config());
    for host in &config.hosts {
        println!("host.{}={} {} [{}]", host.name, host.kind, host.url, host.models.join(", "));
    }
    EXIT_SUCCESS
}

/// Check the harness preconditions.
///
/// Returns 0 if a `bench` run would start, 2 otherwise.
pub fn run_validate(config: &BenchConfig) -> i32 {
    match validate_hosts(&config.hosts, config.benchmark_count) {
        Ok(()) => {
            println!(
                "Configuration is valid: {} hosts, {} iterations each.",
                config.hosts.len(),
                config.benchmark_count
            );
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("INVALID: {}", e);
            EXIT_CONFIG_ERROR
        }
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("FLEET_BENCH_RESULTS_DIR={}", cfg.results_dir);
    println!("FLEET_BENCH_COUNT={}", cfg.benchmark_count);
    println!("FLEET_BENCH_REQUEST_TIMEOUT={}", cfg.request_timeout_secs);
    println!("prompt_chars={}", cfg.prompt_chars);
    println!("hosts={}", cfg.host_count);
    println!("analytics.accuracy_dir={}", cfg.accuracy_dir);
    println!("analytics.benchmark_dir={}", cfg.benchmark_dir);
    println!("analytics.metadata_dir={}", cfg.metadata_dir);
    println!("analytics.report_path={}", cfg.report_path);
}
