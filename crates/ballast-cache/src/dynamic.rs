use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::allotment::{Allotment, DynamicCache};
use crate::error::Result;
use crate::lru_cache::{Evicted, LruCache};

/// Thread-safe, cloneable handle to a named [`LruCache`].
///
/// This is the type subsystems register as a resizer leaf: the budget owner
/// pushes capacities through [`Allotment::set_capacity`] while the subsystem
/// keeps calling [`put`](DynamicLruCache::put) and
/// [`try_get`](DynamicLruCache::try_get) from its own threads. Every call takes
/// the internal lock for its duration only.
pub struct DynamicLruCache<K, V> {
    name: Arc<str>,
    inner: Arc<Mutex<LruCache<K, V>>>,
}

impl<K, V> Clone for DynamicLruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<K: Hash + Eq, V> DynamicLruCache<K, V> {
    pub fn new(name: impl Into<String>, capacity: i64) -> Result<Self> {
        LruCache::new(name, capacity).map(Self::from_cache)
    }

    pub fn with_sizer<F>(name: impl Into<String>, capacity: i64, item_size: F) -> Result<Self>
    where
        F: Fn(&K, &V) -> i64 + Send + Sync + 'static,
    {
        LruCache::with_sizer(name, capacity, item_size).map(Self::from_cache)
    }

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
        LruCache::with_sizers(name, capacity, item_size, freed_size).map(Self::from_cache)
    }

    pub fn from_cache(cache: LruCache<K, V>) -> Self {
        Self {
            name: Arc::from(cache.name()),
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    /// Clone of the value for `key`, promoting it on a hit.
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.lock().try_get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().contains(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().remove(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn resize(&self, capacity: i64) -> Result<Evicted> {
        self.inner.lock().resize(capacity)
    }

    /// Run `f` with exclusive access to the underlying cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut LruCache<K, V>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<K, V> Allotment for DynamicLruCache<K, V>
where
    K: Hash + Eq + Send,
    V: Send,
{
    fn size(&self) -> i64 {
        self.inner.lock().size()
    }

    fn capacity(&self) -> i64 {
        self.inner.lock().capacity()
    }

    fn set_capacity(&self, capacity: i64) -> Result<()> {
        self.inner.lock().set_capacity(capacity)
    }
}

impl<K, V> DynamicCache for DynamicLruCache<K, V>
where
    K: Hash + Eq + Send,
    V: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn freed_size(&self) -> i64 {
        self.inner.lock().freed_size()
    }

    fn reset_freed_size(&self) {
        self.inner.lock().reset_freed_size();
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for DynamicLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.inner.lock(), f)
    }
}
