//! Buffers for reading and writing to [crate::Blob]s.

mod read;
mod write;

pub use read::Read;
pub use write::Write;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::memory, Blob as _, Error, Storage as _};
    use commonware_macros::test_traced;
    use std::num::NonZeroUsize;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test_traced]
    fn test_read_basic() {
        let storage = memory::Storage::default();
        let data = b"Hello, world! This is a test.";
        let blob = storage.create("partition", "test").unwrap();
        blob.write_at(data, 0).unwrap();
        let size = data.len() as u64;

        // Small buffer to exercise refills
        let mut reader = Read::new(blob, size, nz(10));
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"Hello, wor"[..]));
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"ld! This i"[..]));
        assert_eq!(reader.position(), 20);
        assert_eq!(reader.remaining(), 9);
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"s a test."[..]));
        assert_eq!(reader.remaining(), 0);

        // Nothing remains beyond the end
        assert_eq!(reader.next_chunk().unwrap(), None);
    }

    #[test_traced]
    fn test_read_seek() {
        let storage = memory::Storage::default();
        let data = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let blob = storage.create("partition", "test").unwrap();
        blob.write_at(data, 0).unwrap();
        let size = data.len() as u64;
        let mut reader = Read::new(blob, size, nz(5));

        // Seek forward outside the buffer
        reader.seek_to(20).unwrap();
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"UVWXY"[..]));

        // Seek backwards within the buffer
        reader.seek_to(21).unwrap();
        assert_eq!(reader.position(), 21);
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"VWXY"[..]));

        // Seek backwards outside the buffer
        reader.seek_to(0).unwrap();
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"ABCDE"[..]));

        // Seeking to the end is allowed but seeking past it is not
        reader.seek_to(size).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.next_chunk().unwrap(), None);
        assert!(matches!(
            reader.seek_to(size + 1),
            Err(Error::BlobInsufficientLength)
        ));
    }

    #[test_traced]
    fn test_read_chunks() {
        let storage = memory::Storage::default();
        let data: Vec<u8> = (0..100u8).collect();
        let blob = storage.create("partition", "test").unwrap();
        blob.write_at(&data, 0).unwrap();

        let mut reader = Read::new(blob, data.len() as u64, nz(32));
        let mut collected = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            assert!(chunk.len() <= 32);
            collected.extend_from_slice(chunk);
        }
        assert_eq!(collected, data);
        assert_eq!(reader.position(), 100);
    }

    #[test_traced]
    fn test_write_basic() {
        let storage = memory::Storage::default();
        let blob = storage.create("partition", "test").unwrap();

        let mut writer = Write::new(blob.clone(), 0, nz(8));
        writer.write(b"hello").unwrap();
        assert_eq!(writer.position(), 5);

        // Nothing reaches the blob until the buffer fills or is flushed
        let (_, len) = storage.open("partition", "test").unwrap();
        assert_eq!(len, 0);

        // Exceeds capacity: buffered bytes are flushed first
        writer.write(b" world").unwrap();
        writer.write(b"! and a payload larger than the buffer").unwrap();
        writer.sync().unwrap();

        let expected = b"hello world! and a payload larger than the buffer";
        assert_eq!(writer.position(), expected.len() as u64);
        let (blob, len) = storage.open("partition", "test").unwrap();
        assert_eq!(len, expected.len() as u64);
        let mut buf = vec![0u8; expected.len()];
        blob.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, expected);
    }

    #[test_traced]
    fn test_write_then_read() {
        let storage = memory::Storage::default();
        let blob = storage.create("partition", "test").unwrap();
        let mut writer = Write::new(blob.clone(), 0, nz(16));
        for i in 0..100u8 {
            writer.write(&[i; 3]).unwrap();
        }
        writer.sync().unwrap();

        let mut reader = Read::new(blob, writer.position(), nz(7));
        let mut collected = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            collected.extend_from_slice(chunk);
        }
        let expected: Vec<u8> = (0..100u8).flat_map(|i| [i; 3]).collect();
        assert_eq!(collected, expected);
    }
}
