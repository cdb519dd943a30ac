//! Least-frequently-used selection
//!
//! Candidates are grouped by read count and groups are drained in ascending
//! order; inside a group the earliest inserted object goes first.

use std::collections::BTreeMap;

use super::candidate::EvictionCandidate;
use super::CleanupAlgorithm;
use crate::cache::traits::CacheKey;

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastFrequentlyUsed;

impl CleanupAlgorithm for LeastFrequentlyUsed {
    fn name(&self) -> &'static str {
        "lfu"
    }

    fn select_victims<K: CacheKey>(
        &self,
        candidates: Vec<EvictionCandidate<K>>,
        count: usize,
    ) -> Vec<EvictionCandidate<K>> {
        let mut groups: BTreeMap<u64, Vec<EvictionCandidate<K>>> = BTreeMap::new();
        for candidate in candidates {
            groups.entry(candidate.read_count).or_default().push(candidate);
        }

        let mut victims = Vec::with_capacity(count);
        for (_, mut group) in groups {
            if victims.len() >= count {
                break;
            }
            group.sort_unstable_by_key(|c| c.generation);
            let take = (count - victims.len()).min(group.len());
            victims.extend(group.into_iter().take(take));
        }
        victims
    }
}
