//! Benchmark for writing a complete fileset.

use super::utils::{config, random_ids, write, BenchContext};
use criterion::{criterion_group, Criterion};
use shardfs_runtime::storage::memory;
use std::time::{Duration, Instant};

fn bench_write(c: &mut Criterion) {
    for entries in [10_000, 100_000] {
        let ids = random_ids(entries);
        for summaries_percent in [1.0, 0.1, 0.01] {
            let cfg = config(summaries_percent);
            let label = format!(
                "{}/entries={} summaries_percent={}",
                module_path!(),
                entries,
                summaries_percent
            );
            c.bench_function(&label, |b| {
                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let context = BenchContext::new(memory::Storage::default());
                        let start = Instant::now();
                        write(context, &cfg, 0, &ids);
                        total += start.elapsed();
                    }
                    total
                });
            });
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_write
}
