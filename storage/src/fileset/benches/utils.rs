//! Helpers shared by the fileset benchmarks.

use bytes::Bytes;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use shardfs_runtime::{storage::memory, Context};
use shardfs_storage::{
    crc32::Crc32,
    fileset::{Config, Writer},
};
use std::{
    num::NonZeroUsize,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Number of bytes that can be buffered before being written to storage.
const WRITE_BUFFER: usize = 1024 * 1024; // 1MB

/// Number of bytes read at a time when scanning a file.
const READ_BUFFER: usize = 4 * 1024; // 4KB

/// Partition for filesets.
pub const PARTITION: &str = "fileset_bench";

/// Namespace for filesets.
pub const NAMESPACE: &str = "bench";

/// Duration covered by a fileset.
pub const BLOCK_SIZE: Duration = Duration::from_secs(2 * 60 * 60);

/// Size of each payload.
const PAYLOAD_SIZE: usize = 128;

/// Fixed-length identifier.
pub type Id = [u8; 32];

/// Concrete context type for benchmarks.
pub type BenchContext = Context<memory::Storage>;

/// The block start of every benchmark fileset.
pub fn block_start() -> SystemTime {
    UNIX_EPOCH + BLOCK_SIZE * 250_000
}

/// Configuration for a fileset summarizing `summaries_percent` of its entries.
pub fn config(summaries_percent: f64) -> Config {
    Config {
        partition: PARTITION.into(),
        summaries_percent,
        max_identifier_size: 64,
        write_buffer: NonZeroUsize::new(WRITE_BUFFER).unwrap(),
        read_buffer: NonZeroUsize::new(READ_BUFFER).unwrap(),
    }
}

/// Generate `count` sorted, unique random identifiers.
pub fn random_ids(count: usize) -> Vec<Id> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let mut id = [0u8; 32];
        rng.fill_bytes(&mut id);
        ids.push(id);
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Write a fileset containing `ids` to `shard`.
pub fn write(context: BenchContext, cfg: &Config, shard: u32, ids: &[Id]) {
    let payload = [7u8; PAYLOAD_SIZE];
    let checksum = Crc32::checksum(&payload);
    let mut writer = Writer::init(context, cfg, NAMESPACE, BLOCK_SIZE, shard, block_start()).unwrap();
    for id in ids {
        writer
            .write(Bytes::copy_from_slice(id), &payload, checksum)
            .unwrap();
    }
    writer.close().unwrap();
}
