//! Variable-length integer encoding and decoding
//!
//! Implements the LEB128 encoding used by Protocol Buffers. Each byte uses:
//! - 7 bits for the value
//! - 1 "continuation" bit to indicate if more bytes follow
//!
//! `usize` is omitted to prevent the format from depending on the target architecture.

use crate::Error;
use bytes::{Buf, BufMut};
use std::ops::{BitOrAssign, Shl, ShrAssign};

const BITS_PER_BYTE: usize = 8;
const DATA_BITS_PER_BYTE: usize = 7;
const DATA_BITS_MASK: u8 = 0x7F;
const CONTINUATION_BIT_MASK: u8 = 0x80;

/// A trait for unsigned integers that can be varint encoded.
pub trait UInt:
    Copy + From<u8> + Sized + ShrAssign<usize> + Shl<usize, Output = Self> + BitOrAssign<Self> + PartialOrd
{
    /// Returns the number of leading zeros in the integer.
    fn leading_zeros(self) -> u32;

    /// Returns the least significant byte of the integer.
    fn as_u8(self) -> u8;
}

macro_rules! impl_uint {
    ($type:ty) => {
        impl UInt for $type {
            #[inline]
            fn leading_zeros(self) -> u32 {
                self.leading_zeros()
            }

            #[inline]
            fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}
impl_uint!(u32);
impl_uint!(u64);

/// Encodes an unsigned integer as a varint.
pub fn write<T: UInt>(value: T, buf: &mut impl BufMut) {
    let continuation_threshold = T::from(CONTINUATION_BIT_MASK);
    let mut val = value;
    while val >= continuation_threshold {
        buf.put_u8(val.as_u8() | CONTINUATION_BIT_MASK);
        val >>= DATA_BITS_PER_BYTE;
    }
    buf.put_u8(val.as_u8());
}

/// Decodes an unsigned integer from a varint.
///
/// Rejects encodings that would overflow `T`.
pub fn read<T: UInt>(buf: &mut impl Buf) -> Result<T, Error> {
    let max_bits = std::mem::size_of::<T>() * BITS_PER_BYTE;
    let mut result = T::from(0);
    let mut shift = 0;
    loop {
        if !buf.has_remaining() {
            return Err(Error::EndOfBuffer);
        }
        let byte = buf.get_u8();

        // On what must be the last byte, any bit beyond the width of T (including the
        // continuation bit) is an overflow.
        let remaining_bits = max_bits - shift;
        if remaining_bits <= DATA_BITS_PER_BYTE {
            let relevant_bits = BITS_PER_BYTE - byte.leading_zeros() as usize;
            if relevant_bits > remaining_bits {
                return Err(Error::InvalidVarint);
            }
        }

        result |= T::from(byte & DATA_BITS_MASK) << shift;
        if byte & CONTINUATION_BIT_MASK == 0 {
            return Ok(result);
        }
        shift += DATA_BITS_PER_BYTE;
    }
}

/// Calculates the number of bytes needed to encode an unsigned integer as a varint.
pub fn size<T: UInt>(value: T) -> usize {
    let total_bits = std::mem::size_of::<T>() * BITS_PER_BYTE;
    let data_bits = total_bits - value.leading_zeros() as usize;
    usize::max(1, data_bits.div_ceil(DATA_BITS_PER_BYTE))
}
