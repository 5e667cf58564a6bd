//! Least-recently-used cache guarded by a single lock
//!
//! Every operation takes the same mutex for its whole duration, so all
//! operations on one cache are totally ordered. Recency is tracked in a
//! `VecDeque` ordered from most recently used (front) to least recently
//! used (back).

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use walletdb_common::{Error, Result};

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

struct LruState<K, V> {
    /// Keys from most to least recently used
    order: VecDeque<K>,
    entries: HashMap<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            entries: HashMap::with_capacity(capacity + 1),
            capacity,
        }
    }

    fn promote(&mut self, key: &K) {
        if self.order.front() == Some(key) {
            return;
        }
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_front(k);
            }
        }
    }

    /// Insert or replace, then evict the back entry if over capacity.
    /// Returns true if an entry was evicted.
    fn insert(&mut self, key: K, value: V) -> bool {
        if self.entries.insert(key.clone(), value).is_some() {
            self.promote(&key);
        } else {
            self.order.push_front(key);
        }

        if self.entries.len() > self.capacity {
            if let Some(lru) = self.order.pop_back() {
                self.entries.remove(&lru);
                return true;
            }
        }
        false
    }
}

/// Fixed-capacity, thread-safe LRU cache
pub struct LruCache<K, V> {
    state: Mutex<LruState<K, V>>,
    stats: CacheStats,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one so that a value just put is
    /// always retrievable until the next insertion.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState::new(capacity.max(1))),
            stats: CacheStats::default(),
        }
    }

    /// Insert or replace the entry for `key` and mark it most recently used.
    /// Evicts exactly one entry (the least recently used) if the insertion
    /// took the cache over capacity.
    pub fn put(&self, key: K, value: V) {
        let mut state = self.state.lock();
        if state.insert(key, value) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Like [`put`](Self::put), but a no-op if `key` is already cached.
    /// Existing value and recency are left untouched.
    pub fn put_if_absent(&self, key: K, value: V) {
        let mut state = self.state.lock();
        if state.entries.contains_key(&key) {
            return;
        }
        if state.insert(key, value) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a copy of the cached value and mark it most recently used.
    ///
    /// A miss is an error, not a default value.
    pub fn get(&self, key: &K) -> Result<V> {
        let mut state = self.state.lock();
        let Some(value) = state.entries.get(key).cloned() else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Err(Error::KeyNotFound);
        };
        state.promote(key);
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Check if key is in cache. Does not change recency.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Remove an entry, returning its value if it was cached
    pub fn invalidate(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let value = state.entries.remove(key)?;
        state.order.retain(|k| k != key);
        Some(value)
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Alias of [`len`](Self::len)
    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
