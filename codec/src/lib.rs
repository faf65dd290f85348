//! Encode and decode fileset records.
//!
//! # Overview
//!
//! A small binary serialization library used to persist the records of a fileset
//! (index entries, summary entries, info and digest records). It is designed to:
//! - Serialize structured data into a compact, architecture-independent binary format
//! - Deserialize untrusted (possibly corrupted) input without unbounded allocation
//!
//! # Supported Types
//!
//! Natively supports:
//! - Fixed-size big-endian integers: `u8`, `u16`, `u32`, `u64`, `i64`
//! - Variable-length unsigned integers via [varint]
//! - [bytes::Bytes], length-prefixed and bounded by a [RangeCfg]
//!
//! # Example
//!
//! ```
//! use bytes::{Buf, BufMut, Bytes};
//! use shardfs_codec::{varint, Decode, Encode, EncodeSize, Error, RangeCfg, Read, Write};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Record {
//!     key: Bytes,
//!     position: u64,
//! }
//!
//! impl Write for Record {
//!     fn write(&self, buf: &mut impl BufMut) {
//!         self.key.write(buf);
//!         varint::write(self.position, buf);
//!     }
//! }
//!
//! impl EncodeSize for Record {
//!     fn encode_size(&self) -> usize {
//!         self.key.encode_size() + varint::size(self.position)
//!     }
//! }
//!
//! impl Read for Record {
//!     type Cfg = RangeCfg;
//!
//!     fn read_cfg(buf: &mut impl Buf, cfg: &RangeCfg) -> Result<Self, Error> {
//!         let key = Bytes::read_cfg(buf, cfg)?;
//!         let position = varint::read(buf)?;
//!         Ok(Self { key, position })
//!     }
//! }
//!
//! let record = Record { key: Bytes::from_static(b"cpu.user"), position: 300 };
//! let encoded = record.encode();
//! assert_eq!(encoded.len(), 1 + 8 + 2);
//! let decoded = Record::decode_cfg(encoded, &RangeCfg::from(..=64)).unwrap();
//! assert_eq!(record, decoded);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod types;
pub mod util;
pub mod varint;

pub use codec::{Decode, DecodeExt, Encode, EncodeSize, FixedSize, Read, ReadExt, Write};
pub use config::RangeCfg;
pub use error::Error;
