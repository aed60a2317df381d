//! CLI subcommands for the fleet-bench binary.
//!
//! Each `run_*` function prints to stdout/stderr and returns a process exit code.
//!
//! ## Usage
//!
//! ```bash
//! fleet-bench bench --config fleet.toml      # Time every host, write results
//! fleet-bench analyze --accelerator gpu1     # Build the metrics report
//! fleet-bench models list --host gpu1        # Inspect a host's models
//! fleet-bench config validate                # Check run preconditions
//! ```

pub mod analyze_cmd;
pub mod bench_cmd;
pub mod config_cmd;
pub mod models_cmd;

use std::path::PathBuf;

use crate::config::BenchConfig;

/// Config file used when neither `--config` nor `FLEET_BENCH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "fleet-bench.toml";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Value following `flag` in `args`, if present.
pub fn option_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values, after the first `skip`.
pub fn positional(args: &[String], skip: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(skip);
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

/// `--config`, then `FLEET_BENCH_CONFIG`, then [`DEFAULT_CONFIG_PATH`].
pub fn config_path(args: &[String]) -> PathBuf {
    option_value(args, "--config")
        .map(PathBuf::from)
        .or_else(|| std::env::var("FLEET_BENCH_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the config, reporting failures as a configuration error exit code.
pub fn load_config(args: &[String]) -> Result<BenchConfig, i32> {
    let path = config_path(args);
    BenchConfig::load(&path).map_err(|e| {
        tracing::error!(error = %e, "configuration error");
        eprintln!("Error: {}", e);
        EXIT_CONFIG_ERROR
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
