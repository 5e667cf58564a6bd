//! Read-through LRU cache in front of a store.
//!
//! Only present values are cached. Every store call that changes what the
//! cache should hold runs under one lock together with its cache update, so
//! the cache never holds a value the store does not.

use crate::store::KvStore;
use parking_lot::Mutex;
use std::sync::Arc;
use walletdb_cache::LruCache;
use walletdb_common::Result;
use walletdb_common::config::CacheConfig;

pub struct CachedStore {
    store: Arc<KvStore>,
    cache: LruCache<String, String>,
    /// Held across a store call and the cache update that follows it
    update_lock: Mutex<()>,
}

impl CachedStore {
    pub fn new(store: Arc<KvStore>, capacity: usize) -> Self {
        Self {
            store,
            cache: LruCache::new(capacity),
            update_lock: Mutex::new(()),
        }
    }

    pub fn from_config(store: Arc<KvStore>, config: &CacheConfig) -> Self {
        Self::new(store, config.capacity)
    }

    pub fn store(&self) -> &Arc<KvStore> {
        &self.store
    }

    pub fn cache(&self) -> &LruCache<String, String> {
        &self.cache
    }

    pub fn read(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        // `contains` and `get` are separate lock acquisitions; an eviction in
        // between is a plain miss.
        if self.cache.contains(&key)
            && let Ok(value) = self.cache.get(&key)
        {
            return Ok(Some(value));
        }

        let _guard = self.update_lock.lock();
        let value = self.store.read(&key)?;
        if let Some(value) = &value {
            self.cache.put(key, value.clone());
        }
        Ok(value)
    }

    pub fn write(&self, key: &str, payload: &str) -> Result<()> {
        let _guard = self.update_lock.lock();
        self.store.write(key, payload)?;
        self.cache.put(key.to_string(), payload.to_string());
        Ok(())
    }

    pub fn write_if_absent(&self, key: &str, payload: &str) -> Result<()> {
        let _guard = self.update_lock.lock();
        self.store.write_if_absent(key, payload)?;
        self.cache.put(key.to_string(), payload.to_string());
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.update_lock.lock();
        self.store.delete(key)?;
        self.cache.invalidate(&key.to_string());
        Ok(())
    }
}
