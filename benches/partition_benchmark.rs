//! Partitioner and Executor Benchmarks
//!
//! Benchmarks covering:
//! - Weighted block splitting throughput (flat and stratified)
//! - Sequential vs parallel map-reduce over weighted blocks
//! - End-to-end source processing (filter + split + weight)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hazard_engine::composite::{CompositeSourceModel, SourceModel, TrtModel};
use hazard_engine::executor::{apply_reduce, ExecutionStrategy};
use hazard_engine::filter::SourceProcessor;
use hazard_engine::geo::Site;
use hazard_engine::logictree::{GsimBranch, GsimLogicTree};
use hazard_engine::partition::{split_in_blocks, split_in_blocks_by_key};
use hazard_engine::source::{Source, SourceKind};
use hazard_engine::types::{BranchPath, GroupId, MagRange};

/// Create N weighted items spread over `keys` grouping keys
fn create_items(count: usize, keys: u32) -> Vec<(u32, f64)> {
    (0..count)
        .map(|i| (i as u32 % keys, 1.0 + (i % 13) as f64))
        .collect()
}

/// Create a composite model with `count` sources over two region types
fn create_model(count: usize) -> CompositeSourceModel {
    let sources: Vec<Source> = (0..count)
        .map(|i| {
            let (trt, kind) = if i % 3 == 0 {
                ("Subduction", SourceKind::SimpleFault)
            } else {
                ("Active Shallow Crust", SourceKind::Area)
            };
            let geometry = (0..10)
                .map(|j| Site::new((i * 10 + j) as f64 * 0.001, 0.0))
                .collect();
            Source::new(
                format!("src-{i}"),
                trt,
                kind,
                MagRange::new(5.0, 7.5),
                100 + (i as u64 % 50),
            )
            .with_geometry(geometry)
        })
        .collect();
    let gsim_lt = GsimLogicTree::new(vec![
        GsimBranch::new("Active Shallow Crust", "g1", "BooreAtkinson2008", 1.0),
        GsimBranch::new("Subduction", "g2", "ZhaoEtAl2006", 1.0),
    ])
    .expect("valid tree");
    let groups = TrtModel::collect(sources).expect("no trt clash");
    let sm = SourceModel::new("bench", BranchPath::new(["b1"]), 1.0, groups, gsim_lt);
    CompositeSourceModel::new(42, 0, vec![sm]).expect("valid model")
}

/// Benchmark block-splitting throughput
fn bench_split_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_throughput");

    for item_count in [1_000, 10_000, 100_000].iter() {
        let items = create_items(*item_count, 16);

        group.bench_with_input(
            BenchmarkId::new("flat", item_count),
            item_count,
            |b, _| {
                b.iter(|| {
                    black_box(split_in_blocks(items.clone(), 64, |(_, w)| *w));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("by_key", item_count),
            item_count,
            |b, _| {
                b.iter(|| {
                    black_box(split_in_blocks_by_key(
                        items.clone(),
                        64,
                        |(_, w)| *w,
                        |(k, _)| GroupId::new(*k),
                    ));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark sequential vs parallel map-reduce
fn bench_map_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_reduce");

    let items: Vec<f64> = (1..=50_000).map(|i| i as f64).collect();

    for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel] {
        group.bench_function(format!("{strategy:?}"), |b| {
            b.iter(|| {
                let (total, _) = apply_reduce(
                    strategy,
                    items.clone(),
                    32,
                    |w| *w,
                    |block| {
                        // a mildly expensive per-block computation
                        Ok(block.items.iter().map(|w| w.sqrt()).sum::<f64>())
                    },
                    |acc: f64, partial| acc + partial,
                    0.0,
                )
                .expect("no worker fails");
                black_box(total);
            });
        });
    }

    group.finish();
}

/// Benchmark the full filter/split/weight pass
fn bench_source_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_processing");
    group.sample_size(20);

    for source_count in [100, 1_000].iter() {
        for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), source_count),
                source_count,
                |b, &count| {
                    b.iter(|| {
                        let mut csm = create_model(count);
                        let processor = SourceProcessor::new()
                            .with_splitting(5.0)
                            .with_strategy(strategy);
                        processor.process(&mut csm).expect("pass succeeds");
                        black_box(csm.num_sources());
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_split_throughput,
    bench_map_reduce,
    bench_source_processing,
);

criterion_main!(benches);
