use crate::{Blob, Error};
use std::num::NonZeroUsize;

/// A reader that buffers content from a [Blob] to optimize the performance
/// of sequential scans.
///
/// # Example
///
/// ```
/// use shardfs_runtime::{buffer::Read, storage::memory, Blob, Storage};
/// use std::num::NonZeroUsize;
///
/// let storage = memory::Storage::default();
/// let blob = storage.create("my_partition", "my_data").unwrap();
/// blob.write_at(b"Hello, world! This is a test.", 0).unwrap();
///
/// let mut reader = Read::new(blob, 29, NonZeroUsize::new(8).unwrap());
/// assert_eq!(reader.next_chunk().unwrap(), Some(&b"Hello, w"[..]));
/// assert_eq!(reader.position(), 8);
/// ```
pub struct Read<B: Blob> {
    /// The underlying blob to read from.
    blob: B,
    /// The buffer storing the data read from the blob.
    buffer: Vec<u8>,
    /// The position in the blob from where the buffer was filled.
    blob_position: u64,
    /// The size of the blob.
    blob_size: u64,
    /// The current position within the buffer for reading.
    buffer_position: usize,
    /// The valid data length in the buffer.
    buffer_valid_len: usize,
}

impl<B: Blob> Read<B> {
    /// Creates a new `Read` over the first `blob_size` bytes of `blob`.
    pub fn new(blob: B, blob_size: u64, buffer_size: NonZeroUsize) -> Self {
        Self {
            blob,
            buffer: vec![0; buffer_size.get()],
            blob_position: 0,
            blob_size,
            buffer_position: 0,
            buffer_valid_len: 0,
        }
    }

    /// Returns how many valid bytes are remaining in the buffer.
    fn buffer_remaining(&self) -> usize {
        self.buffer_valid_len - self.buffer_position
    }

    /// Returns how many bytes remain between the current position and the end of the blob.
    pub fn remaining(&self) -> u64 {
        self.blob_size.saturating_sub(self.position())
    }

    /// Returns the current absolute position in the blob.
    pub fn position(&self) -> u64 {
        self.blob_position + self.buffer_position as u64
    }

    /// Refills the buffer from the blob starting at the current position.
    fn refill(&mut self) -> Result<usize, Error> {
        // Update blob position to account for consumed bytes
        self.blob_position += self.buffer_position as u64;
        self.buffer_position = 0;
        self.buffer_valid_len = 0;

        let blob_remaining = self.blob_size.saturating_sub(self.blob_position);
        if blob_remaining == 0 {
            return Err(Error::BlobInsufficientLength);
        }

        // Read the minimum of the buffer size and the remaining bytes
        let bytes_to_read = std::cmp::min(self.buffer.len() as u64, blob_remaining) as usize;
        self.blob
            .read_at(&mut self.buffer[..bytes_to_read], self.blob_position)?;
        self.buffer_valid_len = bytes_to_read;

        Ok(bytes_to_read)
    }

    /// Returns (and consumes) the bytes currently buffered, refilling first if the buffer is
    /// exhausted. Returns `None` at the end of the blob.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>, Error> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        if self.buffer_remaining() == 0 {
            self.refill()?;
        }
        let start = self.buffer_position;
        self.buffer_position = self.buffer_valid_len;
        Ok(Some(&self.buffer[start..self.buffer_valid_len]))
    }

    /// Repositions the reader to the specified position in the blob.
    pub fn seek_to(&mut self, position: u64) -> Result<(), Error> {
        if position > self.blob_size {
            return Err(Error::BlobInsufficientLength);
        }

        let buffer_start = self.blob_position;
        let buffer_end = self.blob_position + self.buffer_valid_len as u64;
        if position >= buffer_start && position < buffer_end {
            // Position is within the current buffer
            self.buffer_position = (position - buffer_start) as usize;
        } else {
            self.blob_position = position;
            self.buffer_position = 0;
            self.buffer_valid_len = 0;
        }
        Ok(())
    }
}
