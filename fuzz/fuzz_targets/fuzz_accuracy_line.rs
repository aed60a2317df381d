//! Fuzz target for accuracy log line parsing.
//!
//! Arbitrary lines must parse or fail cleanly, and any record that parses
//! must feed the aggregate computation without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use fleet_bench::metrics::{compute, parse_accuracy_line, BundleKey, ModelMetricsBundle};

fuzz_target!(|data: &str| {
    let Ok(record) = parse_accuracy_line(data) else {
        return;
    };

    let mut bundle = ModelMetricsBundle::new(BundleKey::new("fuzz", "model"), "model");
    bundle.accuracy = vec![record.clone(), record];
    let agg = compute(&bundle);

    assert_eq!(agg.accuracy.total, 2);
    assert!(agg.accuracy.correct <= agg.accuracy.total);
});
