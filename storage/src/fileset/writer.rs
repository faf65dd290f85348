use super::{
    entry::VERSION, partition, to_nanos, Config, Error, File, IndexEntry, Info, Sampler,
    SummaryEntry,
};
use crate::digest::{self, Digests};
use bytes::Bytes;
use prometheus_client::metrics::counter::Counter;
use shardfs_codec::Encode;
use shardfs_runtime::{hex, Metrics, Storage};
use std::{
    num::NonZeroUsize,
    time::{Duration, SystemTime},
};
use tracing::{debug, trace, warn};

/// The lifecycle of a [Writer].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// No entries have been written.
    Open,
    /// At least one entry has been written.
    Writing,
    /// A write failed and the files may be inconsistent.
    Failed,
}

/// Writes a single fileset.
///
/// Entries must be written in strictly ascending identifier order. The fileset only becomes
/// visible to readers once [Writer::close] returns successfully. If a [Writer] is dropped
/// without being closed (or fails), the files it created must be removed with
/// [super::remove] before the fileset can be written again.
pub struct Writer<E: Storage + Metrics> {
    context: E,
    partition: String,
    block_start: u64,
    block_size: u64,
    shard: u32,
    write_buffer: NonZeroUsize,
    max_identifier_size: usize,
    sampler: Sampler,

    data: digest::Writer<E::Blob>,
    index: digest::Writer<E::Blob>,
    summaries: digest::Writer<E::Blob>,

    state: State,
    entries: u64,
    last: Option<Bytes>,

    written: Counter,
    summarized: Counter,
    bytes: Counter,
}

impl<E: Storage + Metrics> Writer<E> {
    /// Create the files of a new fileset.
    ///
    /// Returns [Error::AlreadyExists] if any file of the fileset already exists (including the
    /// leftovers of a [Writer] that was never closed).
    pub fn init(
        context: E,
        cfg: &Config,
        namespace: &str,
        block_size: Duration,
        shard: u32,
        block_start: SystemTime,
    ) -> Result<Self, Error> {
        let sampler = Sampler::new(cfg.summaries_percent)?;
        let partition = partition(cfg, namespace, shard)?;
        let block_start = to_nanos(block_start)?;
        let block_size =
            u64::try_from(block_size.as_nanos()).map_err(|_| Error::InvalidBlockSize)?;

        // Refuse to touch an existing fileset
        for file in File::ALL {
            let name = file.name(block_start);
            if context.exists(&partition, &name)? {
                return Err(Error::AlreadyExists(partition, name));
            }
        }

        // Create the files written during the session
        let create = |file: File| -> Result<E::Blob, Error> {
            let name = file.name(block_start);
            match context.create(&partition, &name) {
                Ok(blob) => Ok(blob),
                Err(shardfs_runtime::Error::BlobExists(partition, name)) => {
                    Err(Error::AlreadyExists(partition, name))
                }
                Err(err) => Err(err.into()),
            }
        };
        let data = digest::Writer::new(create(File::Data)?, cfg.write_buffer);
        let index = digest::Writer::new(create(File::Index)?, cfg.write_buffer);
        let summaries = digest::Writer::new(create(File::Summaries)?, cfg.write_buffer);

        // Metrics are shared by every writer created with the same context
        let written = context.counter("entries", "Number of entries written");
        let summarized = context.counter("summaries", "Number of summaries written");
        let bytes = context.counter("bytes", "Number of payload bytes written");

        debug!(
            partition,
            block_start,
            interval = sampler.interval(),
            "created fileset"
        );
        Ok(Self {
            context,
            partition,
            block_start,
            block_size,
            shard,
            write_buffer: cfg.write_buffer,
            max_identifier_size: cfg.max_identifier_size,
            sampler,
            data,
            index,
            summaries,
            state: State::Open,
            entries: 0,
            last: None,
            written,
            summarized,
            bytes,
        })
    }

    /// The number of entries written so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Append an entry with identifier `id` whose payload has the CRC32 `checksum`.
    ///
    /// `id` must be strictly greater than the identifier of the previous entry, otherwise
    /// [Error::UnorderedIdentifier] is returned and nothing is written. If writing to storage
    /// fails, the [Writer] can no longer be used and every later call returns
    /// [Error::WriterFailed].
    pub fn write(&mut self, id: Bytes, payload: &[u8], checksum: u32) -> Result<(), Error> {
        if self.state == State::Failed {
            return Err(Error::WriterFailed);
        }
        if id.len() > self.max_identifier_size {
            return Err(Error::IdentifierTooLarge(id.len()));
        }
        if self.last.as_ref().is_some_and(|last| id <= *last) {
            return Err(Error::UnorderedIdentifier {
                index: self.entries,
            });
        }

        if let Err(err) = self.append(id, payload, checksum) {
            warn!(partition = self.partition, block_start = self.block_start, ?err, "write failed");
            self.state = State::Failed;
            return Err(err);
        }
        self.state = State::Writing;
        Ok(())
    }

    fn append(&mut self, id: Bytes, payload: &[u8], checksum: u32) -> Result<(), Error> {
        let entry = IndexEntry {
            index: self.entries,
            id,
            offset: self.data.position(),
            size: payload.len() as u64,
            checksum,
        };
        self.data.write(payload)?;

        let offset = self.index.position();
        self.index.write(&entry.encode())?;
        if self.sampler.admit(entry.index) {
            let summary = SummaryEntry {
                id: entry.id.clone(),
                offset,
            };
            self.summaries.write(&summary.encode())?;
            self.summarized.inc();
        }
        trace!(
            index = entry.index,
            id = hex(&entry.id),
            offset,
            size = entry.size,
            "wrote entry"
        );

        self.entries += 1;
        self.last = Some(entry.id);
        self.written.inc();
        self.bytes.inc_by(entry.size);
        Ok(())
    }

    /// Persist all entries and complete the fileset.
    ///
    /// The data, index, and summaries files are synced before the info file is written. The
    /// digest file is written (and synced) last.
    pub fn close(mut self) -> Result<(), Error> {
        if self.state == State::Failed {
            return Err(Error::WriterFailed);
        }
        self.data.sync()?;
        self.index.sync()?;
        self.summaries.sync()?;

        // Describe the fileset
        let info = Info {
            version: VERSION,
            shard: self.shard,
            block_start: self.block_start,
            block_size: self.block_size,
            entries: self.entries,
            summaries_interval: self.sampler.interval(),
        };
        let blob = self
            .context
            .create(&self.partition, &File::Info.name(self.block_start))?;
        let mut writer = digest::Writer::new(blob, self.write_buffer);
        writer.write(&info.encode())?;
        writer.sync()?;

        // Seal the fileset
        let digests = Digests {
            info: writer.digest(),
            index: self.index.digest(),
            summaries: self.summaries.digest(),
            data: self.data.digest(),
        };
        let blob = self
            .context
            .create(&self.partition, &File::Digest.name(self.block_start))?;
        let mut writer = digest::Writer::new(blob, self.write_buffer);
        writer.write(&digests.encode())?;
        writer.sync()?;

        debug!(
            partition = self.partition,
            block_start = self.block_start,
            entries = self.entries,
            summaries = self.sampler.expected(self.entries),
            "closed fileset"
        );
        Ok(())
    }
}
