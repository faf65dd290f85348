use crate::{Blob, Error};
use std::num::NonZeroUsize;

/// A writer that buffers appends to a [Blob].
///
/// Bytes are held in memory until the buffer would overflow, [Write::flush] or
/// [Write::sync] is called. Writes larger than the buffer bypass it.
///
/// # Example
///
/// ```
/// use shardfs_runtime::{buffer::Write, storage::memory, Storage};
/// use std::num::NonZeroUsize;
///
/// let storage = memory::Storage::default();
/// let blob = storage.create("my_partition", "my_data").unwrap();
/// let mut writer = Write::new(blob, 0, NonZeroUsize::new(8).unwrap());
/// writer.write(b"hello").unwrap();
/// assert_eq!(writer.position(), 5);
/// writer.sync().unwrap();
/// ```
pub struct Write<B: Blob> {
    /// The underlying blob to write to.
    blob: B,
    /// The buffer storing data to be written to the blob.
    buffer: Vec<u8>,
    /// The position in the blob where the next flush will write.
    position: u64,
    /// The maximum size of the buffer.
    capacity: usize,
}

impl<B: Blob> Write<B> {
    /// Creates a new `Write` that appends to `blob` starting at `position`.
    pub fn new(blob: B, position: u64, capacity: NonZeroUsize) -> Self {
        Self {
            blob,
            buffer: Vec::with_capacity(capacity.get()),
            position,
            capacity: capacity.get(),
        }
    }

    /// Returns the current position in the blob, including buffered but not-yet-flushed bytes.
    pub fn position(&self) -> u64 {
        self.position + self.buffer.len() as u64
    }

    /// Appends bytes, flushing the buffer first if they would not fit.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.buffer.len() + bytes.len() > self.capacity {
            self.flush()?;
        }
        if bytes.len() >= self.capacity {
            self.blob.write_at(bytes, self.position)?;
            self.position += bytes.len() as u64;
            return Ok(());
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Flushes buffered data to the underlying blob. Does nothing if the buffer is empty.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.blob.write_at(&self.buffer, self.position)?;
        self.position += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes buffered data and ensures it is durably persisted to the underlying blob.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.blob.sync()
    }
}
