//! CRC32 checksum utilities.
//!
//! This module provides CRC32 checksum computation using the IEEE 802.3 polynomial
//! (0x04C11DB7, reflected), the same checksum used by zlib and gzip.

/// Size of a CRC32 checksum in bytes.
pub const SIZE: usize = 4;

/// Incremental CRC32 hasher for computing checksums over multiple data chunks.
#[derive(Clone, Default)]
pub struct Crc32 {
    inner: crc32fast::Hasher,
}

impl Crc32 {
    /// Create a new incremental hasher.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: crc32fast::Hasher::new(),
        }
    }

    /// Add data to the checksum computation.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Return the checksum of all data added so far without consuming the hasher.
    #[inline]
    pub fn current(&self) -> u32 {
        self.inner.clone().finalize()
    }

    /// Finalize and return the checksum.
    #[inline]
    pub fn finalize(self) -> u32 {
        self.inner.finalize()
    }

    /// Compute a CRC32 checksum of the given data.
    #[inline]
    pub fn checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}
