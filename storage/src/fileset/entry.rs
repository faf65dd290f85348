//! Records persisted in the index, summaries, and info files.

use bytes::{Buf, BufMut, Bytes};
use shardfs_codec::{
    varint, EncodeSize, Error as CodecError, FixedSize, RangeCfg, Read, ReadExt, Write,
};

/// The version of the fileset format written by this crate.
pub const VERSION: u16 = 1;

/// The location and checksum of a single payload, one per write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// The position of the entry in write order.
    pub index: u64,
    /// The identifier of the entry.
    pub id: Bytes,
    /// The offset of the payload in the data file.
    pub offset: u64,
    /// The length of the payload.
    pub size: u64,
    /// The CRC32 of the payload.
    pub checksum: u32,
}

impl Write for IndexEntry {
    fn write(&self, buf: &mut impl BufMut) {
        varint::write(self.index, buf);
        self.id.write(buf);
        varint::write(self.offset, buf);
        varint::write(self.size, buf);
        self.checksum.write(buf);
    }
}

impl EncodeSize for IndexEntry {
    fn encode_size(&self) -> usize {
        varint::size(self.index)
            + self.id.encode_size()
            + varint::size(self.offset)
            + varint::size(self.size)
            + u32::SIZE
    }
}

impl Read for IndexEntry {
    type Cfg = RangeCfg;

    fn read_cfg(buf: &mut impl Buf, cfg: &Self::Cfg) -> Result<Self, CodecError> {
        let index = varint::read(buf)?;
        let id = Bytes::read_cfg(buf, cfg)?;
        let offset = varint::read(buf)?;
        let size = varint::read(buf)?;
        let checksum = u32::read(buf)?;
        Ok(Self {
            index,
            id,
            offset,
            size,
            checksum,
        })
    }
}

/// A sampled [IndexEntry]: its identifier and the byte offset of its encoding in the index file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryEntry {
    /// The identifier of the summarized entry.
    pub id: Bytes,
    /// The offset of the summarized entry in the index file.
    pub offset: u64,
}

impl Write for SummaryEntry {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        varint::write(self.offset, buf);
    }
}

impl EncodeSize for SummaryEntry {
    fn encode_size(&self) -> usize {
        self.id.encode_size() + varint::size(self.offset)
    }
}

impl Read for SummaryEntry {
    type Cfg = RangeCfg;

    fn read_cfg(buf: &mut impl Buf, cfg: &Self::Cfg) -> Result<Self, CodecError> {
        let id = Bytes::read_cfg(buf, cfg)?;
        let offset = varint::read(buf)?;
        Ok(Self { id, offset })
    }
}

/// Describes the contents of a fileset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Info {
    /// The format version the fileset was written with.
    pub version: u16,
    /// The shard the fileset belongs to.
    pub shard: u32,
    /// The start of the block, in nanoseconds since the unix epoch.
    pub block_start: u64,
    /// The duration of the block, in nanoseconds.
    pub block_size: u64,
    /// The number of entries in the fileset.
    pub entries: u64,
    /// The number of index entries per summary.
    pub summaries_interval: u64,
}

impl Write for Info {
    fn write(&self, buf: &mut impl BufMut) {
        self.version.write(buf);
        self.shard.write(buf);
        self.block_start.write(buf);
        self.block_size.write(buf);
        varint::write(self.entries, buf);
        varint::write(self.summaries_interval, buf);
    }
}

impl EncodeSize for Info {
    fn encode_size(&self) -> usize {
        u16::SIZE
            + u32::SIZE
            + u64::SIZE
            + u64::SIZE
            + varint::size(self.entries)
            + varint::size(self.summaries_interval)
    }
}

impl Read for Info {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let version = u16::read(buf)?;
        let shard = u32::read(buf)?;
        let block_start = u64::read(buf)?;
        let block_size = u64::read(buf)?;
        let entries = varint::read(buf)?;
        let summaries_interval = varint::read(buf)?;
        if summaries_interval == 0 {
            return Err(CodecError::Invalid("Info", "zero summaries interval"));
        }
        Ok(Self {
            version,
            shard,
            block_start,
            block_size,
            entries,
            summaries_interval,
        })
    }
}
