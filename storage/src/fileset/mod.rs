//! Immutable, per-shard, per-block collections of entries served by a two-level sparse index.
//!
//! A fileset holds every entry written to one shard of one namespace for one block of time. It
//! is written exactly once, by a single [Writer], in strictly ascending identifier order, and is
//! then served by any number of concurrent [Reader]s.
//!
//! # Files
//!
//! Each fileset is stored as five blobs in the partition `{partition}/{namespace}/{shard}`, named
//! `fileset-{block_start}-{kind}.db` (where `block_start` is the number of nanoseconds since the
//! unix epoch):
//!
//! ```text
//! +-----------+------------------------------------------------------------------+
//! | info      | Version (u16) | Shard (u32) | Block Start (u64) | Block Size (u64) |
//! |           | Entries (varint) | Summaries Interval (varint)                    |
//! +-----------+------------------------------------------------------------------+
//! | data      | Payload 0 | Payload 1 | ... | Payload N-1                          |
//! +-----------+------------------------------------------------------------------+
//! | index     | IndexEntry 0 | IndexEntry 1 | ... | IndexEntry N-1                 |
//! +-----------+------------------------------------------------------------------+
//! | summaries | SummaryEntry 0 | SummaryEntry k | SummaryEntry 2k | ...            |
//! +-----------+------------------------------------------------------------------+
//! | digest    | CRC32(info) | CRC32(index) | CRC32(summaries) | CRC32(data)       |
//! |           | CRC32(previous 16 bytes)                                         |
//! +-----------+------------------------------------------------------------------+
//! ```
//!
//! An [IndexEntry] is encoded as:
//!
//! ```text
//! +----------------+---------------------+-----------------+---------------+----------------+
//! | Index (varint) | Len(ID) (varint) ID | Offset (varint) | Size (varint) | Checksum (u32) |
//! +----------------+---------------------+-----------------+---------------+----------------+
//! ```
//!
//! and a [SummaryEntry] as:
//!
//! ```text
//! +---------------------+-----------------+
//! | Len(ID) (varint) ID | Offset (varint) |
//! +---------------------+-----------------+
//! ```
//!
//! where the offset of a [SummaryEntry] is the byte offset of the [IndexEntry] it summarizes.
//!
//! # Lookup
//!
//! The summaries file holds every k-th [IndexEntry] (starting with the first), where `k` is
//! derived from [Config::summaries_percent] (see [Sampler]). On open, a [Reader] loads all
//! summaries into memory. To find an identifier, it binary searches the summaries for the
//! greatest identifier less than or equal to the target and scans the index file forward from
//! the summarized offset until it finds the target, passes it, or reaches the end of the index.
//! A scan never decodes more than `k` entries.
//!
//! # Integrity
//!
//! The digest of every file is computed while it is written and persisted in the digest file,
//! which carries a checksum of its own. The digest file is written and synced after every other
//! file, so a fileset without one is incomplete (and treated as absent by [exists] and
//! [block_starts]). A [Reader] verifies the digest of the info, summaries, and index files before
//! decoding them (the data file can be verified with [Reader::validate]) and verifies the
//! checksum of every payload it returns.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use shardfs_runtime::{storage::memory, Context};
//! use shardfs_storage::{crc32::Crc32, fileset::{Config, Reader, Writer}};
//! use std::{num::NonZeroUsize, time::{Duration, UNIX_EPOCH}};
//!
//! let context = Context::new(memory::Storage::default());
//! let cfg = Config {
//!     partition: "filesets".into(),
//!     summaries_percent: 0.5,
//!     max_identifier_size: 1024,
//!     write_buffer: NonZeroUsize::new(1024).unwrap(),
//!     read_buffer: NonZeroUsize::new(1024).unwrap(),
//! };
//! let block_size = Duration::from_secs(2 * 60 * 60);
//! let block_start = UNIX_EPOCH + block_size;
//!
//! // Write a fileset
//! let mut writer = Writer::init(context.clone(), &cfg, "metrics", block_size, 0, block_start).unwrap();
//! for id in ["a", "b", "c", "d"] {
//!     let payload = format!("value of {id}");
//!     let checksum = Crc32::checksum(payload.as_bytes());
//!     writer.write(Bytes::from(id), payload.as_bytes(), checksum).unwrap();
//! }
//! writer.close().unwrap();
//!
//! // Look up an entry
//! let reader = Reader::open(context, &cfg, "metrics", 0, block_start).unwrap();
//! assert_eq!(reader.get(b"c").unwrap().unwrap(), Bytes::from("value of c"));
//! assert!(reader.find(b"aa").unwrap().is_none());
//! ```

use shardfs_runtime::Storage;
use std::{
    fmt,
    num::NonZeroUsize,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

mod entry;
pub use entry::{IndexEntry, Info, SummaryEntry};
mod lookup;
pub use lookup::IndexLookup;
mod reader;
pub use reader::Reader;
mod sampler;
pub use sampler::Sampler;
mod writer;
pub use writer::Writer;

/// Prefix of every blob name in a fileset.
const PREFIX: &str = "fileset";

/// Extension of every blob name in a fileset.
const EXTENSION: &str = "db";

/// Errors that can occur when interacting with a fileset.
#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime error: {0}")]
    Runtime(#[from] shardfs_runtime::Error),
    #[error("fileset already exists: {0}/{1}")]
    AlreadyExists(String, String),
    #[error("checksum mismatch in {file}: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        file: File,
        expected: u32,
        computed: u32,
    },
    #[error("decode failed in {file} at offset {offset}: {source}")]
    Decode {
        file: File,
        offset: u64,
        #[source]
        source: shardfs_codec::Error,
    },
    #[error("identifier not strictly increasing at entry {index}")]
    UnorderedIdentifier { index: u64 },
    #[error("identifier too large: {0}")]
    IdentifierTooLarge(usize),
    #[error("invalid summaries percent: {0}")]
    InvalidSummariesPercent(f64),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid block start")]
    InvalidBlockStart,
    #[error("invalid block size")]
    InvalidBlockSize,
    #[error("summaries count mismatch: expected {expected}, found {found}")]
    SummariesCount { expected: u64, found: u64 },
    #[error("size mismatch in {file}: expected {expected}, found {found}")]
    SizeMismatch { file: File, expected: u64, found: u64 },
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("info mismatch: {0}")]
    InfoMismatch(&'static str),
    #[error("writer failed")]
    WriterFailed,
}

/// Configuration for fileset storage.
#[derive(Clone, Debug)]
pub struct Config {
    /// The [Storage] partition under which all namespaces are stored.
    pub partition: String,

    /// The fraction of index entries, in `(0, 1]`, that are also written to the summaries file.
    ///
    /// Larger values shorten lookups at the cost of reader memory.
    pub summaries_percent: f64,

    /// The maximum length of an identifier.
    pub max_identifier_size: usize,

    /// The size of the write buffer used for each file.
    pub write_buffer: NonZeroUsize,

    /// The size of the read buffer used when scanning files.
    pub read_buffer: NonZeroUsize,
}

/// The kinds of blob that make up a fileset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum File {
    Info,
    Index,
    Summaries,
    Data,
    Digest,
}

impl File {
    /// Every kind of blob, in the order they are covered by the digest file.
    pub const ALL: [File; 5] = [
        File::Info,
        File::Index,
        File::Summaries,
        File::Data,
        File::Digest,
    ];

    /// The suffix identifying this kind of blob.
    pub fn suffix(self) -> &'static str {
        match self {
            File::Info => "info",
            File::Index => "index",
            File::Summaries => "summaries",
            File::Data => "data",
            File::Digest => "digest",
        }
    }

    /// The blob name of this kind of file for the fileset starting at `block_start` (nanoseconds
    /// since the unix epoch).
    pub fn name(self, block_start: u64) -> String {
        format!("{PREFIX}-{block_start}-{}.{EXTENSION}", self.suffix())
    }

    /// Parse a blob name into the block start and kind of file it names.
    fn parse(name: &str) -> Option<(u64, File)> {
        let name = name.strip_prefix(PREFIX)?.strip_prefix('-')?;
        let name = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
        let (block_start, suffix) = name.split_once('-')?;
        let block_start = block_start.parse().ok()?;
        let file = File::ALL.into_iter().find(|file| file.suffix() == suffix)?;
        Some((block_start, file))
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Ensure a namespace is non-empty and contains only alphanumeric, dash (`-`), or underscore
/// (`_`) characters.
fn validate_namespace(namespace: &str) -> Result<(), Error> {
    if namespace.is_empty()
        || !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidNamespace(namespace.into()));
    }
    Ok(())
}

/// The partition storing every fileset of `shard` in `namespace`.
fn partition(cfg: &Config, namespace: &str, shard: u32) -> Result<String, Error> {
    validate_namespace(namespace)?;
    Ok(format!("{}/{}/{}", cfg.partition, namespace, shard))
}

/// Convert a block start to nanoseconds since the unix epoch.
fn to_nanos(block_start: SystemTime) -> Result<u64, Error> {
    let elapsed = block_start
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::InvalidBlockStart)?;
    u64::try_from(elapsed.as_nanos()).map_err(|_| Error::InvalidBlockStart)
}

/// Convert nanoseconds since the unix epoch to a block start.
fn from_nanos(nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos)
}

/// Returns whether a complete fileset exists for the given block.
///
/// A fileset is complete once its digest file has been written. Files left behind by a [Writer]
/// that was never closed do not count.
pub fn exists<E: Storage>(
    context: &E,
    cfg: &Config,
    namespace: &str,
    shard: u32,
    block_start: SystemTime,
) -> Result<bool, Error> {
    let partition = partition(cfg, namespace, shard)?;
    let block_start = to_nanos(block_start)?;
    Ok(context.exists(&partition, &File::Digest.name(block_start))?)
}

/// Returns the block starts of every complete fileset of `shard` in `namespace`, in ascending
/// order.
pub fn block_starts<E: Storage>(
    context: &E,
    cfg: &Config,
    namespace: &str,
    shard: u32,
) -> Result<Vec<SystemTime>, Error> {
    let partition = partition(cfg, namespace, shard)?;
    let names = match context.scan(&partition) {
        Ok(names) => names,
        Err(shardfs_runtime::Error::PartitionMissing(_)) => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut starts: Vec<u64> = names
        .iter()
        .filter_map(|name| File::parse(name))
        .filter(|(_, file)| *file == File::Digest)
        .map(|(block_start, _)| block_start)
        .collect();
    starts.sort_unstable();
    Ok(starts.into_iter().map(from_nanos).collect())
}

/// Remove every file of the fileset for the given block.
///
/// The digest file is removed first, so a fileset that is only partially removed is never
/// considered complete. Returns whether any file was removed.
pub fn remove<E: Storage>(
    context: &E,
    cfg: &Config,
    namespace: &str,
    shard: u32,
    block_start: SystemTime,
) -> Result<bool, Error> {
    let partition = partition(cfg, namespace, shard)?;
    let block_start = to_nanos(block_start)?;
    let mut removed = false;
    for file in [
        File::Digest,
        File::Info,
        File::Summaries,
        File::Index,
        File::Data,
    ] {
        let name = file.name(block_start);
        match context.remove(&partition, Some(&name)) {
            Ok(()) => removed = true,
            Err(shardfs_runtime::Error::BlobMissing(_, _)) => {}
            Err(shardfs_runtime::Error::PartitionMissing(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
    if removed {
        tracing::debug!(partition, block_start, "removed fileset");
    }
    Ok(removed)
}
