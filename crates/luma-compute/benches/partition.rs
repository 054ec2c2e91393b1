//! Benchmarks for work partitioning and the CPU pipeline.
//!
//! Run with: `cargo bench -p luma-compute`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use luma_compute::{
    CpuRuntime, ImageExtent, PartitionStrategy, PipelineOptions, WorkPartition, grayscale,
};

/// Benchmark both partition strategies over common image sizes.
fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    let sizes = [(640, 480), (1920, 1080), (4096, 2160), (5040, 5040)];
    for &(w, h) in &sizes {
        let extent = ImageExtent::new(w, h).unwrap();
        let label = format!("{}x{}", w, h);

        for strategy in [PartitionStrategy::Greedy, PartitionStrategy::Exhaustive] {
            group.bench_with_input(BenchmarkId::new(strategy.to_string(), &label), &extent, |b, e| {
                b.iter(|| WorkPartition::compute(black_box(*e), black_box(1024), strategy))
            });
        }
    }

    group.finish();
}

/// Benchmark the full pipeline on the reference device.
fn bench_cpu_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_pipeline");
    group.sample_size(20);

    let runtime = CpuRuntime::new();
    let options = PipelineOptions::default();

    for &(w, h) in &[(256u32, 256u32), (1024, 768), (1920, 1080)] {
        let extent = ImageExtent::new(w, h).unwrap();
        let pixels: Vec<u8> = (0..extent.byte_len()).map(|i| (i % 251) as u8).collect();

        group.throughput(Throughput::Elements(extent.texel_count() as u64));
        group.bench_with_input(BenchmarkId::new("grayscale", extent), &pixels, |b, p| {
            b.iter(|| grayscale(&runtime, black_box(p), extent, &options).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partition, bench_cpu_pipeline);
criterion_main!(benches);
