//! Storage backends and the clock implementations.
//!
//! The in-memory stores are always available. The RocksDB store is compiled
//! only with the `storage-rocksdb` feature.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
