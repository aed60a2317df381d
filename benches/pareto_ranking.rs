//! Ranking benchmarks.
//!
//! Both fronts are quadratic in the number of bundles; these track how far
//! that stays acceptable.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fleet_bench::metrics::{
    fleet_pareto_front, run_tradeoff_front, BundleKey, RankPoint, TradeoffCandidate,
};

fn create_points(count: usize) -> Vec<RankPoint> {
    (0..count)
        .map(|i| RankPoint {
            accuracy: ((i * 37) % 100) as f64 / 100.0,
            throughput: 10.0 + ((i * 53) % 200) as f64,
            latency_ms: 200.0 + ((i * 71) % 3000) as f64,
        })
        .collect()
}

fn create_candidates(count: usize) -> Vec<TradeoffCandidate> {
    create_points(count)
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let model = format!("model-{}", i);
            TradeoffCandidate {
                key: BundleKey::new("gpu1", &model),
                model,
                accuracy: p.accuracy,
                throughput: p.throughput,
                accuracy_samples: 50,
            }
        })
        .collect()
}

fn bench_fleet_front(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet_pareto_front");

    for count in [10usize, 100, 500] {
        let points = create_points(count);
        group.bench_with_input(BenchmarkId::new("bundles", count), &points, |b, points| {
            b.iter(|| fleet_pareto_front(black_box(points)))
        });
    }

    group.finish();
}

fn bench_run_tradeoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_tradeoff_front");

    for count in [4usize, 16, 64] {
        let candidates = create_candidates(count);
        group.bench_with_input(BenchmarkId::new("models", count), &candidates, |b, candidates| {
            b.iter(|| run_tradeoff_front(black_box(candidates)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fleet_front, bench_run_tradeoff);
criterion_main!(benches);
