use super::{
    entry::VERSION, partition, to_nanos, Config, Error, File, IndexEntry, IndexLookup, Info,
    Sampler,
};
use crate::{
    crc32::{self, Crc32},
    digest::{self, Digests},
};
use bytes::{Buf, Bytes, BytesMut};
use prometheus_client::metrics::counter::Counter;
use shardfs_codec::{DecodeExt, Error as CodecError, FixedSize, RangeCfg, Read};
use shardfs_runtime::{buffer, hex, Blob, Metrics, Storage};
use std::{
    cmp::Ordering,
    num::{NonZeroU64, NonZeroUsize},
    time::SystemTime,
};
use tracing::{debug, trace};

/// Reads a fileset written by a [super::Writer].
///
/// Opening a fileset verifies the digest, info, summaries, and index files and loads every
/// summary into memory. All lookups take `&self` and use their own buffers, so a single
/// [Reader] can serve any number of threads concurrently.
pub struct Reader<E: Storage + Metrics> {
    partition: String,
    block_start: SystemTime,
    info: Info,
    digests: Digests,
    lookup: IndexLookup,

    index: E::Blob,
    index_size: u64,
    data: E::Blob,
    data_size: u64,

    id_cfg: RangeCfg,
    read_buffer: NonZeroUsize,

    lookups: Counter,
    hits: Counter,
    misses: Counter,
    scanned: Counter,
}

impl<E: Storage + Metrics> Reader<E> {
    /// Open and verify the fileset of `shard` in `namespace` starting at `block_start`.
    pub fn open(
        context: E,
        cfg: &Config,
        namespace: &str,
        shard: u32,
        block_start: SystemTime,
    ) -> Result<Self, Error> {
        let partition = partition(cfg, namespace, shard)?;
        let nanos = to_nanos(block_start)?;
        let id_cfg = RangeCfg::from(..=cfg.max_identifier_size);

        // Verify the digests of every other file
        let (blob, len) = context.open(&partition, &File::Digest.name(nanos))?;
        if len != Digests::SIZE as u64 {
            return Err(Error::SizeMismatch {
                file: File::Digest,
                expected: Digests::SIZE as u64,
                found: len,
            });
        }
        let mut buf = [0u8; Digests::SIZE];
        blob.read_at(&mut buf, 0)?;
        let (body, mut stored) = buf.split_at(Digests::SIZE - crc32::SIZE);
        let expected = stored.get_u32();
        let computed = Crc32::checksum(body);
        if computed != expected {
            return Err(Error::ChecksumMismatch {
                file: File::Digest,
                expected,
                computed,
            });
        }
        let digests = Digests::decode(&buf[..]).map_err(|source| Error::Decode {
            file: File::Digest,
            offset: 0,
            source,
        })?;

        // Verify and decode the info file
        let (blob, len) = context.open(&partition, &File::Info.name(nanos))?;
        let mut reader = digest::Reader::new(blob, len, cfg.read_buffer);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let computed = reader.digest();
        if computed != digests.info {
            return Err(Error::ChecksumMismatch {
                file: File::Info,
                expected: digests.info,
                computed,
            });
        }
        let info = Info::decode(buf.as_slice()).map_err(|source| Error::Decode {
            file: File::Info,
            offset: 0,
            source,
        })?;
        if info.version != VERSION {
            return Err(Error::UnsupportedVersion(info.version));
        }
        if info.shard != shard {
            return Err(Error::InfoMismatch("shard"));
        }
        if info.block_start != nanos {
            return Err(Error::InfoMismatch("block start"));
        }

        // Load the summaries
        let interval = NonZeroU64::new(info.summaries_interval)
            .ok_or(Error::InfoMismatch("summaries interval"))?;
        let expected = Sampler::with_interval(interval).expected(info.entries);
        let (blob, len) = context.open(&partition, &File::Summaries.name(nanos))?;
        let reader = digest::Reader::new(blob, len, cfg.read_buffer);
        let lookup = IndexLookup::build(reader, digests.summaries, &id_cfg, expected)?;

        // Verify the index file
        let (index, index_size) = context.open(&partition, &File::Index.name(nanos))?;
        let computed = digest::Reader::new(index.clone(), index_size, cfg.read_buffer).consume()?;
        if computed != digests.index {
            return Err(Error::ChecksumMismatch {
                file: File::Index,
                expected: digests.index,
                computed,
            });
        }

        // The data file is verified as it is read
        let (data, data_size) = context.open(&partition, &File::Data.name(nanos))?;

        // Metrics are shared by every reader opened with the same context
        let lookups = context.counter("lookups", "Number of lookups performed");
        let hits = context.counter("hits", "Number of lookups that found an entry");
        let misses = context.counter("misses", "Number of lookups that found no entry");
        let scanned = context.counter(
            "scanned",
            "Number of index entries decoded during lookups",
        );

        debug!(
            partition,
            block_start = nanos,
            entries = info.entries,
            summaries = lookup.len(),
            "opened fileset"
        );
        Ok(Self {
            partition,
            block_start,
            info,
            digests,
            lookup,
            index,
            index_size,
            data,
            data_size,
            id_cfg,
            read_buffer: cfg.read_buffer,
            lookups,
            hits,
            misses,
            scanned,
        })
    }

    /// The start of the block covered by the fileset.
    pub fn block_start(&self) -> SystemTime {
        self.block_start
    }

    /// The contents of the info file.
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// The number of entries in the fileset.
    pub fn entries(&self) -> u64 {
        self.info.entries
    }

    /// The summaries loaded from the summaries file.
    pub fn lookup(&self) -> &IndexLookup {
        &self.lookup
    }

    /// The total number of index entries decoded by lookups of every reader sharing this
    /// reader's metrics context.
    pub fn scanned(&self) -> u64 {
        self.scanned.get()
    }

    /// Find the index entry of `id`.
    pub fn find(&self, id: &[u8]) -> Result<Option<IndexEntry>, Error> {
        Ok(self.locate(id)?.map(|(_, entry)| entry))
    }

    /// Find the index entry of `id` and the offset of its encoding in the index file.
    ///
    /// Scans the index file from the nearest summary until `id` is found, an entry with a
    /// greater identifier is reached, or the index ends.
    pub fn locate(&self, id: &[u8]) -> Result<Option<(u64, IndexEntry)>, Error> {
        self.lookups.inc();
        let Some(start) = self.lookup.nearest_index_offset(id) else {
            trace!(id = hex(id), "below first summary");
            self.misses.inc();
            return Ok(None);
        };

        let mut entries = Entries::new(
            self.index.clone(),
            self.index_size,
            start,
            self.read_buffer,
            &self.id_cfg,
        )?;
        let mut scanned = 0;
        let result = loop {
            let position = entries.offset;
            let Some(entry) = entries.next()? else {
                break None;
            };
            scanned += 1;
            match entry.id.as_ref().cmp(id) {
                Ordering::Less => continue,
                Ordering::Equal => break Some((position, entry)),
                Ordering::Greater => break None,
            }
        };
        self.scanned.inc_by(scanned);
        match &result {
            Some((position, entry)) => {
                self.hits.inc();
                trace!(
                    id = hex(id),
                    start,
                    scanned,
                    position,
                    offset = entry.offset,
                    "found entry"
                );
            }
            None => {
                self.misses.inc();
                trace!(id = hex(id), start, scanned, "entry not found");
            }
        }
        Ok(result)
    }

    /// Get the payload of `id`, verifying it against the checksum supplied when it was written.
    pub fn get(&self, id: &[u8]) -> Result<Option<Bytes>, Error> {
        let Some(entry) = self.find(id)? else {
            return Ok(None);
        };
        let end = entry
            .offset
            .checked_add(entry.size)
            .ok_or(shardfs_runtime::Error::OffsetOverflow)?;
        if end > self.data_size {
            return Err(Error::SizeMismatch {
                file: File::Data,
                expected: end,
                found: self.data_size,
            });
        }
        let size = usize::try_from(entry.size).map_err(|_| shardfs_runtime::Error::OffsetOverflow)?;
        let mut buf = vec![0u8; size];
        self.data.read_at(&mut buf, entry.offset)?;
        let computed = Crc32::checksum(&buf);
        if computed != entry.checksum {
            return Err(Error::ChecksumMismatch {
                file: File::Data,
                expected: entry.checksum,
                computed,
            });
        }
        Ok(Some(Bytes::from(buf)))
    }

    /// Verify the digest of the entire data file.
    pub fn validate(&self) -> Result<(), Error> {
        let reader = digest::Reader::new(self.data.clone(), self.data_size, self.read_buffer);
        let computed = reader.consume()?;
        if computed != self.digests.data {
            return Err(Error::ChecksumMismatch {
                file: File::Data,
                expected: self.digests.data,
                computed,
            });
        }
        debug!(
            partition = self.partition,
            bytes = self.data_size,
            "validated data"
        );
        Ok(())
    }
}

/// Decodes consecutive [IndexEntry]s from some offset of the index file.
struct Entries<'a, B: Blob> {
    reader: buffer::Read<B>,
    pending: BytesMut,
    offset: u64,
    cfg: &'a RangeCfg,
}

impl<'a, B: Blob> Entries<'a, B> {
    fn new(
        blob: B,
        size: u64,
        offset: u64,
        buffer_size: NonZeroUsize,
        cfg: &'a RangeCfg,
    ) -> Result<Self, Error> {
        let mut reader = buffer::Read::new(blob, size, buffer_size);
        reader.seek_to(offset)?;
        Ok(Self {
            reader,
            pending: BytesMut::new(),
            offset,
            cfg,
        })
    }

    /// Decode the next entry, or return `None` at the end of the index.
    fn next(&mut self) -> Result<Option<IndexEntry>, Error> {
        loop {
            let mut view = &self.pending[..];
            let result = IndexEntry::read_cfg(&mut view, self.cfg);
            let consumed = self.pending.len() - view.len();
            match result {
                Ok(entry) => {
                    self.pending.advance(consumed);
                    self.offset += consumed as u64;
                    return Ok(Some(entry));
                }
                Err(CodecError::EndOfBuffer) => match self.reader.next_chunk()? {
                    Some(chunk) => self.pending.extend_from_slice(chunk),
                    None if self.pending.is_empty() => return Ok(None),
                    None => {
                        return Err(Error::Decode {
                            file: File::Index,
                            offset: self.offset,
                            source: CodecError::EndOfBuffer,
                        })
                    }
                },
                Err(source) => {
                    return Err(Error::Decode {
                        file: File::Index,
                        offset: self.offset,
                        source,
                    })
                }
            }
        }
    }
}
