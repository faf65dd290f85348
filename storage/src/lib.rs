//! Persist and retrieve sharded, immutable filesets.
//!
//! # Status
//!
//! `shardfs-storage` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod crc32;
pub mod digest;
pub mod fileset;
