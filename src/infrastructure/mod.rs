//! Adapters behind the domain ports: in-memory storage and directories,
//! the optional RocksDB store, the stub gateway, and small collaborators
//! for notifications, payouts and error reporting.

pub mod gateway;
pub mod in_memory;
pub mod notifications;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod support;
