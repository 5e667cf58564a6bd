//! walletdb Cache - Bounded concurrent LRU cache
//!
//! Used in front of a store to avoid repeating expensive lookups of the
//! same secret. Independent of storage.

pub mod lru;

pub use lru::{CacheStats, LruCache};
