use std::borrow::Borrow;
use std::hash::Hash;
use std::mem::size_of;

use crate::error::{CacheError, Result};

type SizeFn<K, V> = Box<dyn Fn(&K, &V) -> i64 + Send + Sync>;

struct Entry<V> {
    value: V,
    size: i64,
}

/// Entries removed by a capacity change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evicted {
    pub count: usize,
    pub size: i64,
}

/// A capacity-bounded map that evicts the least recently used entries first.
///
/// Each entry is charged the size returned by the item sizer when it is put
/// (one unit per entry unless a sizer is configured). After every mutating
/// call the summed size of resident entries is at most the capacity.
///
/// `put` and `try_get` count as a use; `peek` and `contains` do not. Entries
/// evicted to make room are added to [`freed_size`](LruCache::freed_size),
/// using the freed-size sizer when one is configured.
pub struct LruCache<K, V> {
    name: String,
    capacity: i64,
    size: i64,
    freed_size: i64,
    entries: lru::LruCache<K, Entry<V>>,
    item_size: SizeFn<K, V>,
    freed_item_size: Option<SizeFn<K, V>>,
}

impl<K, V> LruCache<K, V> {
    /// Approximate in-memory footprint of a single entry, for caches that
    /// account in bytes.
    ///
    /// Covers the inline key and value, the recency-list links and the hash
    /// table slot; heap memory owned by the key or value must be passed in.
    pub fn approximate_item_size(key_heap_bytes: i64, value_heap_bytes: i64) -> i64 {
        let node = size_of::<K>() + size_of::<Entry<V>>() + 2 * size_of::<usize>();
        let slot = 2 * size_of::<usize>();
        (node + slot) as i64 + key_heap_bytes.max(0) + value_heap_bytes.max(0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn freed_size(&self) -> i64 {
        self.freed_size
    }

    pub fn reset_freed_size(&mut self) {
        self.freed_size = 0;
    }
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// A cache charging one unit per entry.
    pub fn new(name: impl Into<String>, capacity: i64) -> Result<Self> {
        Self::build(name.into(), capacity, Box::new(|_, _| 1), None)
    }

    pub fn with_sizer<F>(name: impl Into<String>, capacity: i64, item_size: F) -> Result<Self>
    where
        F: Fn(&K, &V) -> i64 + Send + Sync + 'static,
    {
        Self::build(name.into(), capacity, Box::new(item_size), None)
    }

    /// Like [`with_sizer`](LruCache::with_sizer), but evictions are reported
    /// through `freed_size` instead of the item size. The eviction decision
    /// itself always uses the item size.
    pub fn with_sizers<F, G>(
        name: impl Into<String>,
        capacity: i64,
        item_size: F,
        freed_size: G,
    ) -> Result<Self>
    where
        F: Fn(&K, &V) -> i64 + Send + Sync + 'static,
        G: Fn(&K, &V) -> i64 + Send + Sync + 'static,
    {
        Self::build(
            name.into(),
            capacity,
            Box::new(item_size),
            Some(Box::new(freed_size)),
        )
    }

    fn build(
        name: String,
        capacity: i64,
        item_size: SizeFn<K, V>,
        freed_item_size: Option<SizeFn<K, V>>,
    ) -> Result<Self> {
        if capacity < 0 {
            return Err(CacheError::NegativeCapacity { capacity });
        }
        Ok(Self {
            name,
            capacity,
            size: 0,
            freed_size: 0,
            entries: lru::LruCache::unbounded(),
            item_size,
            freed_item_size,
        })
    }

    /// Insert or replace `key`, making it the most recently used entry, then
    /// evict least recently used entries until the cache fits its capacity.
    pub fn put(&mut self, key: K, value: V) {
        let size = (self.item_size)(&key, &value).max(0);
        match self.entries.put(key, Entry { value, size }) {
            Some(previous) => self.size = self.size.saturating_add(size - previous.size),
            None => self.size = self.size.saturating_add(size),
        }
        self.evict_to_capacity();
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn try_get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Look up `key` without touching the recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.peek(key).map(|entry| &entry.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    /// Remove `key` explicitly. Removed entries are not counted as freed.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.pop(key)?;
        self.size = (self.size - entry.size).max(0);
        Some(entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Drop every entry. Cleared entries are not counted as freed.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
    }

    pub fn set_capacity(&mut self, capacity: i64) -> Result<()> {
        self.resize(capacity).map(|_| ())
    }

    /// Set a new capacity and evict oldest-first until the cache fits,
    /// returning what was evicted.
    pub fn resize(&mut self, capacity: i64) -> Result<Evicted> {
        if capacity < 0 {
            return Err(CacheError::NegativeCapacity { capacity });
        }
        self.capacity = capacity;
        Ok(self.evict_to_capacity())
    }

    fn evict_to_capacity(&mut self) -> Evicted {
        let mut evicted = Evicted::default();
        while self.size > self.capacity {
            let Some((key, entry)) = self.entries.pop_lru() else {
                // Only reachable if a sizer reported inconsistent sizes.
                self.size = 0;
                break;
            };
            // Saturated totals can undershoot once entries leave.
            self.size = (self.size - entry.size).max(0);
            let freed = match &self.freed_item_size {
                Some(freed_size) => freed_size(&key, &entry.value).max(0),
                None => entry.size,
            };
            self.freed_size = self.freed_size.saturating_add(freed);
            evicted.count += 1;
            evicted.size = evicted.size.saturating_add(entry.size);
        }

        if evicted.count > 0 {
            tracing::trace!(
                target: "ballast.cache",
                cache = %self.name,
                count = evicted.count,
                size = evicted.size,
                capacity = self.capacity,
                "evicted least recently used entries"
            );
        }
        evicted
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("name", &self.name)
            .field("len", &self.entries.len())
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("freed_size", &self.freed_size)
            .finish()
    }
}
