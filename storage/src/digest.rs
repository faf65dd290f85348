//! Digest tracking for buffered blob I/O.
//!
//! [Writer] and [Reader] wrap the buffered I/O of [shardfs_runtime::buffer] and maintain a
//! running [Crc32] of every byte that passes through them, so the digest of a file is known as
//! soon as it has been written (or read) without a second pass.

use crate::crc32::{self, Crc32};
use bytes::{Buf, BufMut};
use shardfs_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use shardfs_runtime::{buffer, Blob, Error};
use std::num::NonZeroUsize;

/// A buffered writer that tracks the digest of everything written.
pub struct Writer<B: Blob> {
    inner: buffer::Write<B>,
    hasher: Crc32,
}

impl<B: Blob> Writer<B> {
    /// Create a new [Writer] that appends to an empty `blob`.
    pub fn new(blob: B, capacity: NonZeroUsize) -> Self {
        Self {
            inner: buffer::Write::new(blob, 0, capacity),
            hasher: Crc32::new(),
        }
    }

    /// The number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Append `bytes`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.write(bytes)?;
        self.hasher.update(bytes);
        Ok(())
    }

    /// Flush buffered bytes and durably persist the blob.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.inner.sync()
    }

    /// The digest of everything written so far.
    pub fn digest(&self) -> u32 {
        self.hasher.current()
    }
}

/// A buffered reader that tracks the digest of everything read.
pub struct Reader<B: Blob> {
    inner: buffer::Read<B>,
    hasher: Crc32,
}

impl<B: Blob> Reader<B> {
    /// Create a new [Reader] over the first `size` bytes of `blob`.
    pub fn new(blob: B, size: u64, buffer_size: NonZeroUsize) -> Self {
        Self {
            inner: buffer::Read::new(blob, size, buffer_size),
            hasher: Crc32::new(),
        }
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> u64 {
        self.inner.remaining()
    }

    /// Append every remaining byte of the blob to `out`.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<(), Error> {
        while let Some(chunk) = self.inner.next_chunk()? {
            self.hasher.update(chunk);
            out.extend_from_slice(chunk);
        }
        Ok(())
    }

    /// Read (and discard) every remaining byte of the blob, returning the digest of the blob.
    ///
    /// Memory usage is bounded by the size of the read buffer.
    pub fn consume(mut self) -> Result<u32, Error> {
        while let Some(chunk) = self.inner.next_chunk()? {
            self.hasher.update(chunk);
        }
        Ok(self.hasher.finalize())
    }

    /// The digest of everything read so far.
    pub fn digest(&self) -> u32 {
        self.hasher.current()
    }
}

/// The digests of every other file in a fileset, protected by a checksum of their own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Digests {
    pub info: u32,
    pub index: u32,
    pub summaries: u32,
    pub data: u32,
}

impl Digests {
    /// The checksum of the encoded digests.
    fn checksum(&self) -> u32 {
        let mut hasher = Crc32::new();
        for digest in [self.info, self.index, self.summaries, self.data] {
            hasher.update(&digest.to_be_bytes());
        }
        hasher.finalize()
    }
}

impl Write for Digests {
    fn write(&self, buf: &mut impl BufMut) {
        self.info.write(buf);
        self.index.write(buf);
        self.summaries.write(buf);
        self.data.write(buf);
        self.checksum().write(buf);
    }
}

impl FixedSize for Digests {
    const SIZE: usize = 5 * crc32::SIZE;
}

impl Read for Digests {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let digests = Self {
            info: u32::read(buf)?,
            index: u32::read(buf)?,
            summaries: u32::read(buf)?,
            data: u32::read(buf)?,
        };
        let checksum = u32::read(buf)?;
        if checksum != digests.checksum() {
            return Err(CodecError::Invalid("Digests", "checksum mismatch"));
        }
        Ok(digests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_macros::test_traced;
    use shardfs_codec::{DecodeExt, Encode};
    use shardfs_runtime::{storage::memory, Storage};

    #[test_traced]
    fn test_writer_reader_digests_agree() {
        let storage = memory::Storage::default();
        let blob = storage.create("digest", "blob").unwrap();

        let mut writer = Writer::new(blob, NonZeroUsize::new(7).unwrap());
        let mut expected = Vec::new();
        for i in 0..50u8 {
            let chunk = vec![i; i as usize % 13];
            writer.write(&chunk).unwrap();
            expected.extend_from_slice(&chunk);
        }
        assert_eq!(writer.position(), expected.len() as u64);
        assert_eq!(writer.digest(), Crc32::checksum(&expected));
        writer.sync().unwrap();

        // Read everything back in one pass
        let (blob, len) = storage.open("digest", "blob").unwrap();
        assert_eq!(len, expected.len() as u64);
        let mut reader = Reader::new(blob.clone(), len, NonZeroUsize::new(5).unwrap());
        assert_eq!(reader.remaining(), len);
        assert_eq!(reader.digest(), Crc32::checksum(&[]));
        let mut read = Vec::new();
        reader.read_to_end(&mut read).unwrap();
        assert_eq!(read, expected);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.digest(), Crc32::checksum(&expected));

        // Or stream it without keeping it
        let reader = Reader::new(blob, len, NonZeroUsize::new(5).unwrap());
        assert_eq!(reader.consume().unwrap(), Crc32::checksum(&expected));
    }

    #[test]
    fn test_digests() {
        let digests = Digests {
            info: 1,
            index: 2,
            summaries: 3,
            data: 0xFFFF_FFFF,
        };
        let encoded = digests.encode();
        assert_eq!(encoded.len(), Digests::SIZE);
        assert_eq!(&encoded[..4], &[0, 0, 0, 1]);
        assert_eq!(
            &encoded[16..],
            &Crc32::checksum(&encoded[..16]).to_be_bytes()
        );
        assert_eq!(Digests::decode(encoded.clone()).unwrap(), digests);

        // Any corruption is detected
        for i in 0..encoded.len() {
            let mut corrupted = encoded.to_vec();
            corrupted[i] ^= 0x01;
            assert!(matches!(
                Digests::decode(corrupted.as_slice()),
                Err(CodecError::Invalid("Digests", _))
            ));
        }
    }
}
