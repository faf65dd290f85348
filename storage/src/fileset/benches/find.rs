//! Random identifier lookup benchmark for filesets.

use super::utils::{block_start, config, random_ids, write, BenchContext, NAMESPACE};
use criterion::{black_box, criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use shardfs_runtime::storage::memory;
use shardfs_storage::fileset::Reader;
use std::{thread, time::Instant};

/// Entries written to the fileset.
const ENTRIES: usize = 100_000;

/// Lookups per iteration.
const READS: usize = 10_000;

/// Threads used for concurrent lookups.
const THREADS: usize = 8;

fn bench_find(c: &mut Criterion) {
    let ids = random_ids(ENTRIES);
    let mut rng = StdRng::seed_from_u64(0);
    let reads: Vec<_> = (0..READS)
        .map(|_| ids[rng.gen_range(0..ids.len())])
        .collect();

    for summaries_percent in [1.0, 0.1, 0.01] {
        let cfg = config(summaries_percent);
        let context = BenchContext::new(memory::Storage::default());
        write(context.clone(), &cfg, 0, &ids);
        let reader = Reader::open(context, &cfg, NAMESPACE, 0, block_start()).unwrap();

        for mode in ["serial", "concurrent"] {
            let label = format!(
                "{}/mode={} summaries_percent={} reads={}",
                module_path!(),
                mode,
                summaries_percent,
                READS
            );
            c.bench_function(&label, |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();
                    for _ in 0..iters {
                        match mode {
                            "serial" => {
                                for id in &reads {
                                    black_box(reader.get(id).unwrap().unwrap());
                                }
                            }
                            "concurrent" => thread::scope(|scope| {
                                for chunk in reads.chunks(READS / THREADS) {
                                    let reader = &reader;
                                    scope.spawn(move || {
                                        for id in chunk {
                                            black_box(reader.get(id).unwrap().unwrap());
                                        }
                                    });
                                }
                            }),
                            _ => unreachable!(),
                        }
                    }
                    start.elapsed()
                });
            });
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_find
}
