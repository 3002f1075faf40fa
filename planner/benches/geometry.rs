use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use planner::analysis::mock_alternatives;
use planner::estimate::local_metrics;
use planner::geometry::{bounding_box, length_km};
use planner::models::Coordinate;
use rand::{rngs::StdRng, SeedableRng};

/// A zig-zag polyline through Ahmedabad with `n` vertices.
fn polyline(n: usize) -> Vec<Coordinate> {
    (0..n)
        .map(|i| {
            let step = i as f64 * 0.0004;
            let wiggle = if i % 2 == 0 { 0.0002 } else { -0.0002 };
            Coordinate::new(72.5714 + step, 23.0225 + step / 2.0 + wiggle)
        })
        .collect()
}

fn benchmark_path_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_geometry");

    for n in [2usize, 50, 1_000] {
        let path = polyline(n);
        group.bench_with_input(BenchmarkId::new("length_km", n), &path, |b, path| {
            b.iter(|| length_km(black_box(path)))
        });
        group.bench_with_input(BenchmarkId::new("bounding_box", n), &path, |b, path| {
            b.iter(|| bounding_box(black_box(path)))
        });
        group.bench_with_input(BenchmarkId::new("local_metrics", n), &path, |b, path| {
            b.iter(|| local_metrics(black_box(path)))
        });
    }

    group.finish();
}

fn benchmark_mock_alternatives(c: &mut Criterion) {
    let path = polyline(200);
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("mock_alternatives_200", |b| {
        b.iter(|| mock_alternatives(black_box(&path), &mut rng))
    });
}

criterion_group!(benches, benchmark_path_geometry, benchmark_mock_alternatives);
criterion_main!(benches);
