//! fleet-bench entry point.
//!
//! ## CLI Subcommands
//!
//! - `fleet-bench bench` - Time every configured host and write a results file
//! - `fleet-bench analyze` - Build the metrics report from the analytics corpus
//! - `fleet-bench models <list|running|pull|delete|unload|show>` - Host model housekeeping
//! - `fleet-bench config <show|validate>` - Inspect the configuration

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use fleet_bench::cli::models_cmd::ModelsCommand;
use fleet_bench::cli::{
    analyze_cmd, bench_cmd, config_cmd, load_config, models_cmd, option_value, positional,
    EXIT_CONFIG_ERROR, EXIT_FAILURE,
};
use fleet_bench::telemetry::{describe_metrics, init_logging, LogConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Logging disabled: {}", e);
    }
    describe_metrics();

    let code = match command {
        "bench" => match load_config(&args) {
            Ok(config) => {
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("Interrupt received, finishing in-flight iterations...");
                        on_signal.cancel();
                    }
                });
                bench_cmd::run(&config, cancel).await
            }
            Err(code) => code,
        },
        "analyze" => match load_config(&args) {
            Ok(config) => analyze_cmd::run(&config, option_value(&args, "--accelerator")),
            Err(code) => code,
        },
        "models" => {
            let rest = positional(&args, 2);
            let subcommand = rest.first().copied().unwrap_or("list");
            match ModelsCommand::parse(subcommand, rest.get(1).copied()) {
                Ok(models) => match load_config(&args) {
                    Ok(config) => models_cmd::run(&config, models, option_value(&args, "--host")).await,
                    Err(code) => code,
                },
                Err(msg) => {
                    eprintln!("{}", msg);
                    print_command_help("models");
                    EXIT_FAILURE
                }
            }
        }
        "config" => {
            let subcommand = positional(&args, 2).first().copied().unwrap_or("show");
            match subcommand {
                "show" | "validate" => match load_config(&args) {
                    Ok(config) if subcommand == "show" => config_cmd::run_show(&config),
                    Ok(config) => config_cmd::run_validate(&config),
                    Err(code) => code,
                },
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    EXIT_CONFIG_ERROR
                }
            }
        }
        "help" | "--help" | "-h" => {
            match args.get(2) {
                Some(subcommand) => print_command_help(subcommand),
                None => print_usage(),
            }
            0
        }
        "version" | "--version" | "-V" => {
            println!("fleet-bench {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            EXIT_FAILURE
        }
    };
    ExitCode::from(code as u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "fleet-bench - LLM inference fleet benchmark and analytics v{}

USAGE:
    fleet-bench <COMMAND> [OPTIONS]

COMMANDS:
    bench        Run timed streaming probes against every configured host
    analyze      Compute statistics and rankings over the analytics corpus
    models       Manage host models (list, running, pull, delete, unload, show)
    config       Inspect configuration (show, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    --config FILE  Configuration file (default: fleet-bench.toml)

ENVIRONMENT:
    FLEET_BENCH_CONFIG           Configuration file path
    FLEET_BENCH_COUNT            Timed iterations per host
    FLEET_BENCH_RESULTS_DIR      Directory for results files
    FLEET_BENCH_REQUEST_TIMEOUT  Per-request timeout in seconds
    FLEET_BENCH_LOG_FORMAT       json (default) or pretty
    FLEET_BENCH_LOG_FILE         Write JSON logs to this file instead of stderr
    RUST_LOG                     Log filter (debug, info, warn, error)

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "bench" => {
            eprintln!(
                "fleet-bench bench - Benchmark the fleet

USAGE:
    fleet-bench bench [--config FILE]

DESCRIPTION:
    Unloads resident models on every host, then runs benchmark_count timed
    streaming requests per host, all hosts in parallel. Each host must be
    assigned exactly one model and at least two hosts are required.
    Ctrl-C stops new iterations; collected results are still written.

OUTPUT:
    <results_dir>/<model-slugs>-<count>.json
"
            );
        }
        "analyze" => {
            eprintln!(
                "fleet-bench analyze - Build the metrics report

USAGE:
    fleet-bench analyze [--config FILE] [--accelerator ID]

DESCRIPTION:
    Loads accuracy logs, benchmark files and metadata documents named
    <accelerator>_<model>.*, computes per-bundle statistics, marks the
    fleet-wide Pareto front and prints a best-tradeoff summary per
    accelerator (or only for --accelerator).
"
            );
        }
        "models" => {
            eprintln!(
                "fleet-bench models - Manage host models

USAGE:
    fleet-bench models <SUBCOMMAND> [MODEL] [--host NAME]

SUBCOMMANDS:
    list            List models available on each host
    running         List models resident in memory
    pull <MODEL>    Download a model (requires --host)
    delete <MODEL>  Remove a model (requires --host)
    unload <MODEL>  Evict a model from memory (requires --host)
    show <MODEL>    Print model parameters

    llama.cpp servers do not support pull, delete or unload.
"
            );
        }
        "config" => {
            eprintln!(
                "fleet-bench config - Inspect configuration

USAGE:
    fleet-bench config <show|validate> [--config FILE]

SUBCOMMANDS:
    show       Print effective values after environment overrides
    validate   Check bench preconditions without contacting any host
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'fleet-bench help' for general usage.",
                command
            );
        }
    }
}
