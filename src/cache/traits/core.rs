//! Core cache traits for keys, values and type-erased data caches
//!
//! Keys and values get blanket implementations so any ordinary Rust type that
//! satisfies the bounds can be stored without ceremony.

use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::types::ids::DataCacheId;
use crate::telemetry::snapshot::DataCacheStatus;

/// Key stored in a data cache
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Stable hash of the key, used for diagnostics
    fn cache_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;

        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl<T> CacheKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Value stored in a data cache
///
/// `PartialEq` lets the access tracker tell a real modification apart from a
/// write of an identical value, and powers `compare_and_write`.
pub trait CacheValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Outcome of one cleanup pass over a data cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Objects removed because they were already removed/expired
    pub expired: usize,
    /// Objects evicted to restore the resource bound
    pub evicted: usize,
    /// Whether the data cache itself was found past its lifetime
    pub cache_expired: bool,
}

impl CleanupReport {
    /// Total number of objects taken out of the cache
    #[inline]
    pub fn total_removed(&self) -> usize {
        self.expired + self.evicted
    }

    /// Merge another report into this one
    pub fn absorb(&mut self, other: CleanupReport) {
        self.expired += other.expired;
        self.evicted += other.evicted;
        self.cache_expired |= other.cache_expired;
    }
}

/// Type-erased view of a `DataCache<K, V>`
///
/// A cache master owns data caches of many key/value types; this trait is the
/// seam it uses to manage them without knowing the types.
pub trait ManagedCache: Send + Sync + 'static {
    /// Fully-qualified identifier
    fn id(&self) -> &DataCacheId;

    /// Number of object roots currently held (live or awaiting sweep)
    fn size(&self) -> usize;

    /// Whether the cache was marked expired or outlived its lifetime
    fn is_expired(&self) -> bool;

    /// Mark the cache and every object it holds as expired
    fn expire(&self);

    /// Remove every object root
    fn clear(&self);

    /// Run one cleanup pass (lifetime, expired objects, overflow eviction)
    fn cleanup(&self) -> CleanupReport;

    /// Nanosecond timestamp of the last modification
    fn last_modified_ns(&self) -> u64;

    /// Pull-style status snapshot
    fn status(&self) -> DataCacheStatus;

    /// Upcast for typed downcasting by the owning master
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
