use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::{CacheError, Result};

/// The minimal budget consumer: something that holds `size` units and may be
/// told to fit into `capacity` units.
///
/// Capacity is only ever changed by the owning resizer; the consumer is
/// responsible for shrinking itself when the new capacity is below its size.
pub trait Allotment: Send + Sync {
    /// Units currently held.
    fn size(&self) -> i64;

    /// Units the consumer is currently allowed to hold.
    fn capacity(&self) -> i64;

    /// Set a new capacity. Negative capacities are rejected and leave the
    /// consumer unchanged.
    fn set_capacity(&self, capacity: i64) -> Result<()>;
}

/// An [`Allotment`] with a name and an eviction counter.
pub trait DynamicCache: Allotment {
    fn name(&self) -> &str;

    /// Accumulated size of entries evicted since the last
    /// [`reset_freed_size`](DynamicCache::reset_freed_size).
    fn freed_size(&self) -> i64;

    fn reset_freed_size(&self);
}

/// Lightweight allotment for consumers that account their own memory and are
/// not backed by an [`LruCache`](crate::LruCache), e.g. a chunk cache that
/// trims itself after reading [`capacity`](Allotment::capacity).
#[derive(Clone)]
pub struct TrackedAllotment {
    inner: Arc<TrackedInner>,
}

struct TrackedInner {
    size: AtomicI64,
    capacity: AtomicI64,
}

impl TrackedAllotment {
    pub fn new(capacity: i64) -> Result<Self> {
        if capacity < 0 {
            return Err(CacheError::NegativeCapacity { capacity });
        }
        Ok(Self {
            inner: Arc::new(TrackedInner {
                size: AtomicI64::new(0),
                capacity: AtomicI64::new(capacity),
            }),
        })
    }

    pub fn set_size(&self, size: i64) {
        self.inner.size.store(size.max(0), Ordering::Relaxed);
    }

    /// Adjust the tracked size by `delta`, saturating at zero.
    pub fn add_size(&self, delta: i64) {
        let mut current = self.inner.size.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(delta).max(0);
            match self.inner.size.compare_exchange(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Units by which the consumer exceeds its capacity (zero when it fits).
    pub fn overflow(&self) -> i64 {
        (self.size() - self.capacity()).max(0)
    }
}

impl Allotment for TrackedAllotment {
    fn size(&self) -> i64 {
        self.inner.size.load(Ordering::Relaxed)
    }

    fn capacity(&self) -> i64 {
        self.inner.capacity.load(Ordering::Relaxed)
    }

    fn set_capacity(&self, capacity: i64) -> Result<()> {
        if capacity < 0 {
            return Err(CacheError::NegativeCapacity { capacity });
        }
        self.inner.capacity.store(capacity, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for TrackedAllotment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedAllotment")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}
