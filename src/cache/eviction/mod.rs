//! Stateless eviction strategies
//!
//! A strategy only chooses victims from a snapshot of candidates; the data
//! cache performs the removal and skips anything that vanished or was
//! replaced in the meantime.

pub mod candidate;
pub mod lfu;
pub mod lru;

pub use candidate::EvictionCandidate;
pub use lfu::LeastFrequentlyUsed;
pub use lru::LeastRecentlyUsed;

use crate::cache::config::CleanupAlgorithmType;
use crate::cache::traits::CacheKey;

/// Victim selection over a candidate snapshot
pub trait CleanupAlgorithm {
    fn name(&self) -> &'static str;

    /// Choose at most `count` victims
    fn select_victims<K: CacheKey>(
        &self,
        candidates: Vec<EvictionCandidate<K>>,
        count: usize,
    ) -> Vec<EvictionCandidate<K>>;
}

impl CleanupAlgorithmType {
    /// Dispatch to the configured strategy
    pub fn select_victims<K: CacheKey>(
        &self,
        candidates: Vec<EvictionCandidate<K>>,
        count: usize,
    ) -> Vec<EvictionCandidate<K>> {
        if count == 0 || candidates.is_empty() {
            return Vec::new();
        }
        match self {
            CleanupAlgorithmType::Lru => LeastRecentlyUsed.select_victims(candidates, count),
            CleanupAlgorithmType::Lfu => LeastFrequentlyUsed.select_victims(candidates, count),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CleanupAlgorithmType::Lru => LeastRecentlyUsed.name(),
            CleanupAlgorithmType::Lfu => LeastFrequentlyUsed.name(),
        }
    }
}
