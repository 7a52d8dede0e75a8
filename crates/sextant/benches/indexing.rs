//! Benchmarks for Sextant indexing operations.
//!
//! These benchmarks measure:
//! - Full project indexing at different sizes
//! - The no-op run when nothing is stale
//! - Snapshot export and reload

// Benchmark code - performance of the benchmark setup is not critical
#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

mod common;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sextant::{Sextant, Store};

use common::{create_indexed_project, create_project, generate_package};

/// Benchmark full indexing on packages of different sizes.
fn bench_full_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_index");

    for num_modules in &[1, 10, 50] {
        let files = generate_package(*num_modules);
        group.throughput(Throughput::Elements(*num_modules as u64));

        group.bench_with_input(
            BenchmarkId::new("modules", num_modules),
            num_modules,
            |b, _| {
                b.iter_with_setup(
                    || {
                        let (dir, path) = create_project(&files);
                        let sextant = Sextant::open(&path).expect("failed to open Sextant");
                        (dir, sextant)
                    },
                    |(_dir, sextant)| {
                        let stats = sextant.index(&[], false).expect("index failed");
                        black_box(stats)
                    },
                );
            },
        );
    }

    group.finish();
}

/// Benchmark the staleness short-circuit.
fn bench_reindex(c: &mut Criterion) {
    let mut group = c.benchmark_group("reindex");
    let files = generate_package(20);
    let project = create_indexed_project(&files);

    group.bench_function("reindex_unchanged", |b| {
        b.iter(|| {
            let stats = project.sextant.index(&[], false).expect("reindex failed");
            black_box(stats)
        });
    });

    group.bench_function("check_staleness", |b| {
        b.iter(|| {
            let report = project.sextant.check_staleness(&[]).expect("staleness failed");
            black_box(report)
        });
    });

    group.finish();
}

/// Benchmark snapshot export and hydration.
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let files = generate_package(20);
    let project = create_indexed_project(&files);

    group.bench_function("export", |b| {
        b.iter(|| black_box(project.sextant.export().expect("export failed")));
    });

    let index_dir = project.sextant.index_dir().to_path_buf();
    group.bench_function("from_snapshot", |b| {
        b.iter(|| black_box(Store::from_snapshot(&index_dir).expect("load failed")));
    });

    group.finish();
}

criterion_group!(benches, bench_full_index, bench_reindex, bench_snapshot);
criterion_main!(benches);
