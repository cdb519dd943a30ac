//! Eviction candidate: the slice of an object root a strategy needs

use crate::cache::object::ObjectRoot;
use crate::cache::traits::{CacheKey, CacheValue};

/// Point-in-time facts about one object root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate<K> {
    pub key: K,
    /// Root generation; also insertion order within the cache
    pub generation: u64,
    pub read_count: u64,
    /// Zero when never read
    pub last_read_ns: u64,
}

impl<K: CacheKey> EvictionCandidate<K> {
    pub fn from_root<V: CacheValue>(root: &ObjectRoot<K, V>) -> Self {
        let access = root.access();
        Self {
            key: root.key().clone(),
            generation: root.generation(),
            read_count: access.read_count(),
            last_read_ns: access.read_ns(),
        }
    }
}
