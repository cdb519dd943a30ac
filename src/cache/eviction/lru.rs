//! Least-recently-used selection
//!
//! Candidates are ordered by last read time, oldest first. Objects never read
//! carry a read time of zero and go first. Ties fall back to insertion order.

use super::candidate::EvictionCandidate;
use super::CleanupAlgorithm;
use crate::cache::traits::CacheKey;

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRecentlyUsed;

impl CleanupAlgorithm for LeastRecentlyUsed {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn select_victims<K: CacheKey>(
        &self,
        mut candidates: Vec<EvictionCandidate<K>>,
        count: usize,
    ) -> Vec<EvictionCandidate<K>> {
        candidates.sort_unstable_by_key(|c| (c.last_read_ns, c.generation));
        candidates.truncate(count);
        candidates
    }
}
