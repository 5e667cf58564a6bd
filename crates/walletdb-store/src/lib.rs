//! walletdb Store - Persistent secret storage
//!
//! This crate implements the storage layer of the key-management service:
//! - Versioned record encoding with transparent legacy reads
//! - Key-value stores over redb, one database per named store
//! - An init-once registry of the named stores
//! - A read-through LRU cache in front of a store

pub mod cached;
pub mod codec;
pub mod engine;
pub mod registry;
pub mod store;
mod tables;

// Re-exports
pub use cached::CachedStore;
pub use codec::{Record, RecordFormat};
pub use engine::{Engine, RedbEngine};
pub use registry::{StoreName, StoreRegistry};
pub use store::{DumpReport, KeyNamespace, KeyVisitor, KvStore, LatestRecord};
