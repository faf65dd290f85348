use super::{Error, File, SummaryEntry};
use crate::digest;
use bytes::Buf;
use shardfs_codec::{Error as CodecError, RangeCfg, Read};
use shardfs_runtime::Blob;
use tracing::debug;

/// An in-memory, sorted view of the summaries file.
///
/// Each summary maps an identifier to the offset of its entry in the index file. Because
/// summaries are sampled from the index in order, the summary with the greatest identifier
/// less than or equal to some target marks the position from which a scan of the index file
/// will find the target (if it was written).
#[derive(Clone, Debug)]
pub struct IndexLookup {
    summaries: Vec<SummaryEntry>,
}

impl IndexLookup {
    /// Load every summary from `reader`.
    ///
    /// The digest of the summaries file is verified against `expected_digest` before anything
    /// is decoded. Decoding fails if an identifier falls outside of `id_cfg`, if summaries are
    /// not strictly ordered, or if the file does not contain exactly `expected_summaries`
    /// summaries.
    pub fn build<B: Blob>(
        mut reader: digest::Reader<B>,
        expected_digest: u32,
        id_cfg: &RangeCfg,
        expected_summaries: u64,
    ) -> Result<Self, Error> {
        // Verify the file before trusting any of its contents
        let mut buf = Vec::with_capacity(usize::try_from(reader.remaining()).unwrap_or(0));
        reader.read_to_end(&mut buf)?;
        let computed = reader.digest();
        if computed != expected_digest {
            return Err(Error::ChecksumMismatch {
                file: File::Summaries,
                expected: expected_digest,
                computed,
            });
        }

        // Every summary occupies at least two bytes
        let capacity = usize::try_from(expected_summaries)
            .unwrap_or(usize::MAX)
            .min(buf.len() / 2);
        let mut summaries: Vec<SummaryEntry> = Vec::with_capacity(capacity);
        let mut cursor = buf.as_slice();
        while cursor.has_remaining() {
            let offset = (buf.len() - cursor.remaining()) as u64;
            let summary =
                SummaryEntry::read_cfg(&mut cursor, id_cfg).map_err(|source| Error::Decode {
                    file: File::Summaries,
                    offset,
                    source,
                })?;
            if let Some(previous) = summaries.last() {
                if summary.id <= previous.id || summary.offset <= previous.offset {
                    return Err(Error::Decode {
                        file: File::Summaries,
                        offset,
                        source: CodecError::Invalid("SummaryEntry", "out of order"),
                    });
                }
            }
            summaries.push(summary);
        }
        let found = summaries.len() as u64;
        if found != expected_summaries {
            return Err(Error::SummariesCount {
                expected: expected_summaries,
                found,
            });
        }
        debug!(summaries = found, bytes = buf.len(), "loaded summaries");
        Ok(Self { summaries })
    }

    /// The summary with the greatest identifier less than or equal to `id`, if any.
    pub fn nearest(&self, id: &[u8]) -> Option<&SummaryEntry> {
        let position = self
            .summaries
            .partition_point(|summary| summary.id.as_ref() <= id);
        position.checked_sub(1).map(|i| &self.summaries[i])
    }

    /// The offset in the index file from which to scan for `id`.
    ///
    /// Returns `None` if `id` is smaller than every summarized identifier (and therefore was
    /// not written).
    pub fn nearest_index_offset(&self, id: &[u8]) -> Option<u64> {
        self.nearest(id).map(|summary| summary.offset)
    }

    /// The number of summaries.
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Returns whether there are no summaries.
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// The smallest summarized identifier (the first identifier of the fileset).
    pub fn first(&self) -> Option<&[u8]> {
        self.summaries.first().map(|summary| summary.id.as_ref())
    }

    /// The largest summarized identifier.
    pub fn last(&self) -> Option<&[u8]> {
        self.summaries.last().map(|summary| summary.id.as_ref())
    }

    /// Iterate over all summaries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &SummaryEntry> {
        self.summaries.iter()
    }
}
