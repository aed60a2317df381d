//! `analyze` subcommand: build, print and persist the metrics report.

use super::{truncate, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::BenchConfig;
use crate::metrics::{analyze, CorpusDirs, MetricsReport, RunSummary};

/// Analyze the configured corpus.
///
/// With `accelerator`, only that accelerator's run summary is printed; otherwise
/// one summary per accelerator follows the fleet table.
pub fn run(config: &BenchConfig, accelerator: Option<&str>) -> i32 {
    let report = match analyze(&CorpusDirs::from(&config.analytics)) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, path = %e.path().display(), "corpus ingestion failed");
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };

    print_fleet(&report);
    let summaries: Vec<RunSummary> = match accelerator {
        Some(acc) => vec![report.run_summary(acc)],
        None => report.accelerators().into_iter().map(|acc| report.run_summary(acc)).collect(),
    };
    for summary in &summaries {
        print_run_summary(summary);
    }

    let path = &config.analytics.report_path;
    if let Err(e) = report.write_json(path) {
        tracing::error!(error = %e, "report write failed");
        eprintln!("Error: {}", e);
        return EXIT_FAILURE;
    }
    println!("Report written to {}", path.display());
    EXIT_SUCCESS
}

/// Fleet-wide table, `*` marking the strict Pareto front.
pub fn print_fleet(report: &MetricsReport) {
    if report.bundles.is_empty() {
        println!("No bundles found.");
        return;
    }
    println!(
        "{:<1} {:<14} {:<32} {:>8} {:>10} {:>12} {:>8}",
        "", "ACCELERATOR", "MODEL", "ACC %", "TOK/S", "LATENCY ms", "REL TPS"
    );
    println!("{}", "-".repeat(92));
    for bundle in &report.bundles {
        let agg = bundle.derived();
        let comparison = agg.comparison.unwrap_or_default();
        println!(
            "{:<1} {:<14} {:<32} {:>8.1} {:>10.2} {:>12.1} {:>8.2}",
            if comparison.pareto_optimal { "*" } else { "" },
            truncate(&bundle.key.accelerator, 14),
            truncate(&bundle.model_name, 32),
            agg.headline_accuracy() * 100.0,
            agg.headline_throughput(),
            agg.headline_latency_ms(),
            comparison.relative_throughput,
        );
    }
}

/// One accelerator's tradeoff front and winner.
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("Run summary for {}:", summary.accelerator);
    if summary.outcome.points.is_empty() {
        println!("  No model has both throughput and accuracy samples.");
        return;
    }
    for point in &summary.outcome.points {
        println!(
            "  {} {:<32} acc {:>6.1}%  tok/s {:>8.2}  score {:>6.1}",
            if point.on_front { "*" } else { " " },
            truncate(&point.model, 32),
            point.accuracy_pct,
            point.throughput,
            point.composite,
        );
    }
    if let Some(best) = &summary.outcome.best {
        println!("  Best tradeoff: {} (score {:.1})", best.model, best.composite);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_corpus_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BenchConfig::default();
        config.analytics.accuracy_dir = dir.path().join("acc");
        config.analytics.benchmark_dir = dir.path().join("bench");
        config.analytics.metadata_dir = dir.path().join("meta");
        config.analytics.report_path = dir.path().join("out/report.json");

        assert_eq!(run(&config, None), EXIT_SUCCESS);
        assert!(config.analytics.report_path.exists());
    }

    #[test]
    fn test_malformed_corpus_fails() {
        let dir = tempfile::tempdir().unwrap();
        let acc = dir.path().join("acc");
        std::fs::create_dir_all(&acc).unwrap();
        std::fs::write(acc.join("gpu1_m1.jsonl"), "{not json}\n").unwrap();

        let mut config = BenchConfig::default();
        config.analytics.accuracy_dir = acc;
        config.analytics.benchmark_dir = dir.path().join("none");
        config.analytics.metadata_dir = dir.path().join("none");
        config.analytics.report_path = dir.path().join("report.json");

        assert_eq!(run(&config, Some("gpu1")), EXIT_FAILURE);
        assert!(!config.analytics.report_path.exists());
    }
}
