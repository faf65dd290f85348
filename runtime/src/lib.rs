//! Blob storage, buffered I/O, and metrics for fileset storage.
//!
//! This crate provides the primitives the fileset layer is built on:
//! - [Storage] and [Blob]: partitioned, positional (offset-addressed) blob access. Reads take
//!   `&self` and never move a shared cursor, so any number of threads can read the same blob
//!   concurrently.
//! - [buffer::Read] and [buffer::Write]: buffered sequential access to a [Blob].
//! - [Metrics] and [Context]: registration and encoding of prometheus metrics alongside storage.
//!
//! Two [Storage] implementations are provided: [storage::fs] (backed by the local filesystem)
//! and [storage::memory] (backed by process memory, for tests and benchmarks).

use prometheus_client::{metrics::counter::Counter, registry::Metric};
use std::io::Error as IoError;
use thiserror::Error;

pub mod buffer;
mod context;
pub use context::Context;
pub mod storage;
mod utils;
pub use utils::hex;

/// Errors that can occur when interacting with the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("partition name invalid, must be '/'-separated segments of alphanumeric, dash ('-'), or underscore ('_') characters: {0}")]
    PartitionNameInvalid(String),
    #[error("blob name invalid, must only contain alphanumeric, dash ('-'), underscore ('_'), or dot ('.') characters: {0}")]
    BlobNameInvalid(String),
    #[error("partition creation failed: {0}")]
    PartitionCreationFailed(String),
    #[error("partition missing: {0}")]
    PartitionMissing(String),
    #[error("partition corrupt: {0}")]
    PartitionCorrupt(String),
    #[error("blob already exists: {0}/{1}")]
    BlobExists(String, String),
    #[error("blob missing: {0}/{1}")]
    BlobMissing(String, String),
    #[error("blob open failed: {0}/{1} error: {2}")]
    BlobOpenFailed(String, String, IoError),
    #[error("blob remove failed: {0}/{1} error: {2}")]
    BlobRemoveFailed(String, String, IoError),
    #[error("blob read failed: {0}/{1} at {2} error: {3}")]
    BlobReadFailed(String, String, u64, IoError),
    #[error("blob write failed: {0}/{1} at {2} error: {3}")]
    BlobWriteFailed(String, String, u64, IoError),
    #[error("blob sync failed: {0}/{1} error: {2}")]
    BlobSyncFailed(String, String, IoError),
    #[error("blob insufficient length")]
    BlobInsufficientLength,
    #[error("offset overflow")]
    OffsetOverflow,
    #[error("io error: {0}")]
    Io(#[from] IoError),
}

/// Interface to create, open, and remove [Blob]s.
///
/// # Partition Names
///
/// Partition names are one or more `/`-separated segments, each non-empty and containing
/// only ASCII alphanumeric characters, dashes (`-`), or underscores (`_`). A partition is a
/// directory-like namespace: blobs of a nested partition are not returned when scanning its
/// parent, but removing a partition also removes every partition nested beneath it.
///
/// # Blob Names
///
/// Blob names are non-empty, may not start with a dot, and contain only ASCII alphanumeric
/// characters, dashes (`-`), underscores (`_`), or dots (`.`).
pub trait Storage: Clone + Send + Sync + 'static {
    /// The readable/writeable storage buffer that can be opened by this Storage.
    type Blob: Blob;

    /// Create a new, empty blob in the given partition (creating the partition if needed).
    ///
    /// Returns [Error::BlobExists] if a blob with the same name already exists. An Ok result
    /// indicates the blob is durably created.
    fn create(&self, partition: &str, name: &str) -> Result<Self::Blob, Error>;

    /// Open an existing blob, returning the blob and its length.
    ///
    /// Returns [Error::BlobMissing] if the blob does not exist. Opened blobs are only guaranteed
    /// to support reads: a storage may reject [Blob::write_at] on them (only blobs returned by
    /// [Storage::create] are written).
    fn open(&self, partition: &str, name: &str) -> Result<(Self::Blob, u64), Error>;

    /// Return whether a blob exists.
    fn exists(&self, partition: &str, name: &str) -> Result<bool, Error>;

    /// Remove a blob from a given partition.
    ///
    /// If no `name` is provided, the entire partition is removed.
    fn remove(&self, partition: &str, name: Option<&str>) -> Result<(), Error>;

    /// Return the names of all blobs in a given partition (sorted).
    fn scan(&self, partition: &str) -> Result<Vec<String>, Error>;
}

/// Interface to read and write to a blob.
///
/// Cloning a blob is similar to sharing a single file descriptor whereas opening a new
/// blob (of the same name) is similar to opening a new file descriptor. Reads are
/// positional and may be issued concurrently from any number of clones.
///
/// When a blob is dropped, any unsynced changes may be discarded. Call `sync` before
/// dropping to ensure all changes are durably persisted.
pub trait Blob: Clone + Send + Sync + 'static {
    /// Fill `buf` with the bytes stored at `offset`.
    ///
    /// Returns [Error::BlobInsufficientLength] if the blob ends before `buf` is filled.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error>;

    /// Write `buf` to the blob at the given offset, extending the blob if required.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error>;

    /// Ensure all pending data is durably persisted.
    fn sync(&self) -> Result<(), Error>;
}

/// Interface to register and encode metrics.
pub trait Metrics: Clone + Send + Sync + 'static {
    /// Get the current label of the context.
    fn label(&self) -> String;

    /// Create a new instance of `Metrics` with the given label appended to the end
    /// of the current `Metrics` label.
    ///
    /// This is commonly used to create a nested context for `register`.
    fn with_label(&self, label: &str) -> Self;

    /// Register a metric.
    ///
    /// Any registered metric will include (as a prefix) the label of the current context.
    fn register<N: Into<String>, H: Into<String>>(&self, name: N, help: H, metric: impl Metric);

    /// Get the counter registered as `name`, registering it on first use.
    ///
    /// Every caller requesting the same name under the same label shares a single counter, so
    /// short-lived components can be created repeatedly without growing the registry.
    fn counter<N: Into<String>, H: Into<String>>(&self, name: N, help: H) -> Counter;

    /// Encode all metrics into a buffer.
    fn encode(&self) -> String;
}
