//! Capacity-bounded caches that take part in Ballast's shared memory budget.
//!
//! The budget itself lives in `ballast-memory`; this crate only provides the
//! consumer side:
//! - [`Allotment`] is the minimal capability a budget consumer exposes: a
//!   current size and a capacity that the budget owner may change at any time.
//! - [`DynamicCache`] adds a name and a "freed size" counter for consumers that
//!   evict on their own.
//! - [`LruCache`] is a single-owner, recency-ordered map with pluggable size
//!   accounting; [`DynamicLruCache`] is its shareable, lock-protected handle
//!   that implements both capabilities.
//!
//! Sizes and capacities are plain `i64` values in whatever unit the owning
//! resizer declares (bytes or entries).

mod allotment;
mod dynamic;
mod error;
mod lru_cache;

pub use allotment::{Allotment, DynamicCache, TrackedAllotment};
pub use dynamic::DynamicLruCache;
pub use error::{CacheError, Result};
pub use lru_cache::{Evicted, LruCache};
