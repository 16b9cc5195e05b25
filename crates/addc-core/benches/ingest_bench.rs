//! AddC ingestion benchmark suite
//!
//! - saturated ingest throughput across kmax
//! - lazy vs eager neighbor repair
//! - closest-pair query after a single move

use addc_core::closest_pair::{ClosestPairIndex, SlotId};
use addc_core::{AddcConfig, Distance, DistanceConfig, OnlineClusterer, RepairPolicy};
use addc_test_utils::uniform_points;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const STREAM_LEN: usize = 2_000;

// =============================================================================
// Helper Functions
// =============================================================================

fn saturated_engine(kmax: usize, policy: RepairPolicy, dim: usize) -> OnlineClusterer {
    let config = AddcConfig::new(kmax)
        .with_distance(DistanceConfig::Euclidean)
        .with_repair_policy(policy)
        .with_symmetry_check(false);
    let mut addc = OnlineClusterer::new(config).expect("valid config");
    addc.batch(uniform_points(kmax, dim, 0.0, 1.0, 1))
        .expect("fill");
    addc
}

// =============================================================================
// Engine Benchmarks
// =============================================================================

fn bench_ingest_by_kmax(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_saturated");
    let stream = uniform_points(STREAM_LEN, 8, 0.0, 1.0, 42);
    group.throughput(Throughput::Elements(STREAM_LEN as u64));

    for kmax in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(kmax), &kmax, |b, &kmax| {
            b.iter_batched(
                || saturated_engine(kmax, RepairPolicy::Lazy, 8),
                |mut addc| {
                    addc.batch(black_box(&stream)).expect("ingest");
                    addc
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_repair_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair_policy");
    let stream = uniform_points(STREAM_LEN, 8, 0.0, 1.0, 7);
    group.throughput(Throughput::Elements(STREAM_LEN as u64));

    for policy in [RepairPolicy::Lazy, RepairPolicy::Eager] {
        group.bench_with_input(
            BenchmarkId::new("kmax_128", format!("{:?}", policy)),
            &policy,
            |b, &policy| {
                b.iter_batched(
                    || saturated_engine(128, policy, 8),
                    |mut addc| {
                        addc.batch(black_box(&stream)).expect("ingest");
                        addc
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Index Benchmarks
// =============================================================================

fn bench_move_then_query(c: &mut Criterion) {
    let points = uniform_points(512, 16, 0.0, 1.0, 3);
    let index = ClosestPairIndex::from_points(Distance::euclidean(), points)
        .expect("index")
        .with_symmetry_check(false);
    let targets = uniform_points(64, 16, 0.0, 1.0, 4);

    c.bench_function("move_then_closest_pair_512x16", |b| {
        b.iter_batched(
            || index.clone(),
            |mut index| {
                for (i, t) in targets.iter().enumerate() {
                    index.move_point(SlotId::new(i), t.clone()).expect("move");
                    black_box(index.closest_pair().expect("pair"));
                }
                index
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_ingest_by_kmax, bench_repair_policy, bench_move_then_query);
criterion_main!(benches);
