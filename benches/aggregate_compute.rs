//! Aggregate computation benchmarks.
//!
//! Measures the per-bundle compute pass and the percentile helper as the
//! number of accuracy records grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fleet_bench::metrics::stats::percentile;
use fleet_bench::metrics::{compute, AccuracyRecord, BenchmarkRun, BundleKey, ModelMetricsBundle};

fn create_bundle(records: usize) -> ModelMetricsBundle {
    let mut bundle = ModelMetricsBundle::new(BundleKey::new("gpu1", "bench-model"), "bench-model");
    bundle.accuracy = (0..records)
        .map(|i| AccuracyRecord {
            model: "bench-model".into(),
            correct: i % 3 != 0,
            difficulty: (i % 5) as f64,
            margin_of_error: (i % 7) as f64 * 0.4,
            time_to_first_token_ms: Some(80.0 + (i % 11) as f64),
            total_duration_ms: Some(1500.0 + (i % 13) as f64 * 20.0),
            tokens_per_second: Some(40.0 + (i % 17) as f64),
            input_tokens: 100 + (i as u64 % 9000),
            output_tokens: 200,
            logprobs: (i % 2 == 0).then(|| vec![-0.2, -0.1, -0.4]),
            ..AccuracyRecord::default()
        })
        .collect();
    bundle.benchmarks = vec![BenchmarkRun {
        n_gen: 128,
        avg_ns: 2.5e9,
        avg_ts: 51.2,
        model_n_params: 1_000_000_000,
        samples_ns: vec![2.4e9, 2.5e9, 2.6e9],
        ..BenchmarkRun::default()
    }];
    bundle
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle_compute");

    for count in [100usize, 1_000, 10_000] {
        let bundle = create_bundle(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("records", count), &bundle, |b, bundle| {
            b.iter(|| compute(black_box(bundle)))
        });
    }

    group.finish();
}

fn bench_percentile(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile");

    for count in [1_000usize, 100_000] {
        let values: Vec<f64> = (0..count).map(|i| ((i * 7919) % 1000) as f64).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("p99", count), &values, |b, values| {
            b.iter(|| percentile(black_box(values), 99.0))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute, bench_percentile);
criterion_main!(benches);
