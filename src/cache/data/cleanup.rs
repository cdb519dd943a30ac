//! Expiry, cleanup passes and the type-erased `ManagedCache` view

use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::DataCache;
use crate::cache::eviction::EvictionCandidate;
use crate::cache::policy::PolicyChecker;
use crate::cache::traits::{CacheKey, CacheValue, CleanupReport, ManagedCache};
use crate::cache::types::{timestamp_nanos, DataCacheId};
use crate::telemetry::snapshot::DataCacheStatus;

impl<K: CacheKey, V: CacheValue> DataCache<K, V> {
    /// Whether the cache was marked expired or outlived its lifetime
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
            || PolicyChecker::is_lifetime_exceeded(
                &self.policy.lifetime,
                self.created_ns,
                timestamp_nanos(),
            )
    }

    /// Like `is_expired`, but applies a lifetime expiry it discovers
    pub(super) fn check_expired(&self) -> bool {
        if self.expired.load(Ordering::Acquire) {
            return true;
        }
        let now = timestamp_nanos();
        if PolicyChecker::is_lifetime_exceeded(&self.policy.lifetime, self.created_ns, now) {
            self.expire();
            return true;
        }
        false
    }

    /// Mark the cache expired and cascade to every object it holds
    pub fn expire(&self) {
        if self.expired.swap(true, Ordering::AcqRel) {
            return;
        }
        let now = timestamp_nanos();
        let retired = self
            .roots_snapshot()
            .into_iter()
            .filter(|root| root.retire_expired(now))
            .count();
        log::debug!("Expired data cache {} ({} object(s))", self.id, retired);
    }

    /// Evict `count` objects chosen by the configured strategy
    fn evict(&self, count: usize, now_ns: u64) -> usize {
        let candidates: Vec<_> = self
            .roots
            .iter()
            .filter(|entry| {
                let root = entry.value();
                root.is_live() && PolicyChecker::is_removal_possible(root.loans())
            })
            .map(|entry| EvictionCandidate::from_root(entry.value().as_ref()))
            .collect();
        let victims = self
            .policy
            .cleanup_algorithm
            .select_victims(candidates, count);

        let mut evicted = Vec::with_capacity(victims.len());
        for victim in victims {
            let Some(root) = self.root(&victim.key) else {
                continue;
            };
            // Replaced since the snapshot
            if root.generation() != victim.generation {
                continue;
            }
            // Locked since the snapshot
            if let Ok(Some(value)) = root.try_retire_removed(now_ns) {
                self.detach(&root);
                evicted.push((victim.key, value));
            }
        }

        if !evicted.is_empty() {
            self.stats.record_evictions(evicted.len());
            log::debug!(
                "Evicted {} object(s) from {} using {}",
                evicted.len(),
                self.id,
                self.policy.cleanup_algorithm.name()
            );
            for (key, value) in &evicted {
                self.notify_removed(key, value);
            }
            self.touch(now_ns);
        }
        evicted.len()
    }

    /// One cleanup pass: lifetime, retired objects, then overflow eviction
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport {
            cache_expired: self.check_expired(),
            ..CleanupReport::default()
        };
        let now = timestamp_nanos();

        if !report.cache_expired && !self.policy.object_lifetime.is_forever() {
            for root in self.roots_snapshot() {
                if root.is_live() {
                    self.retire_if_outlived(&root, now);
                }
            }
        }

        report.expired = self.take_expired().len();

        let overflow = self.policy.resource_limits.overflow(self.size());
        if overflow > 0 {
            report.evicted = self.evict(overflow, now);
        }
        report
    }

    pub fn status(&self) -> DataCacheStatus {
        let (mut live, mut loaned) = (0, 0);
        for entry in self.roots.iter() {
            let root = entry.value();
            live += root.is_live() as usize;
            loaned += root.loans().is_loaned() as usize;
        }
        DataCacheStatus {
            id: self.id.to_string(),
            master: self.id.master().to_string(),
            typename: self.id.typename().to_string(),
            size: self.size(),
            live,
            loaned,
            expired: self.is_expired(),
            max_samples: self.policy.resource_limits.max_samples,
            hard_limit: self.policy.resource_limits.is_hard(),
            cleanup_algorithm: self.policy.cleanup_algorithm,
            created_ns: self.created_ns,
            last_modified_ns: self.last_modified_ns(),
            statistics: self.stats.snapshot(),
        }
    }
}

impl<K: CacheKey, V: CacheValue> ManagedCache for DataCache<K, V> {
    fn id(&self) -> &DataCacheId {
        DataCache::id(self)
    }

    fn size(&self) -> usize {
        DataCache::size(self)
    }

    fn is_expired(&self) -> bool {
        DataCache::is_expired(self)
    }

    fn expire(&self) {
        DataCache::expire(self)
    }

    fn clear(&self) {
        DataCache::clear(self)
    }

    fn cleanup(&self) -> CleanupReport {
        DataCache::cleanup(self)
    }

    fn last_modified_ns(&self) -> u64 {
        DataCache::last_modified_ns(self)
    }

    fn status(&self) -> DataCacheStatus {
        DataCache::status(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::cache_with;
    use super::*;
    use crate::cache::config::{CachePolicy, CleanupAlgorithmType, LoanPolicy};
    use std::time::Duration;

    fn bounded(max: usize, algorithm: CleanupAlgorithmType) -> DataCache<String, u32> {
        cache_with(
            CachePolicy::builder()
                .max_samples(max)
                .cleanup_algorithm(algorithm)
                .build()
                .data,
        )
    }

    fn keys_of(cache: &DataCache<String, u32>) -> Vec<String> {
        let mut keys = cache.key_set();
        keys.sort();
        keys
    }

    #[test]
    fn test_soft_bound_restored_by_cleanup() {
        let cache = bounded(5, CleanupAlgorithmType::Lru);
        for i in 0..12 {
            cache.write(format!("k{:02}", i), i).ok();
        }
        assert_eq!(cache.size(), 12);
        let report = cache.cleanup();
        assert_eq!(report.evicted, 7);
        assert!(cache.size() <= 5);
        assert_eq!(cache.statistics().evictions, 7);
    }

    #[test]
    fn test_lru_evicts_oldest_reads() {
        let cache = bounded(3, CleanupAlgorithmType::Lru);
        for key in ["a", "b", "c", "d", "e"] {
            cache.write(key.to_string(), 0).ok();
        }
        for key in ["c", "a", "e", "b", "d"] {
            cache.read(&key.to_string());
        }
        assert_eq!(cache.cleanup().evicted, 2);
        assert_eq!(keys_of(&cache), vec!["b", "d", "e"]);
    }

    #[test]
    fn test_end_to_end_never_read_evicted_first() {
        let cache = bounded(3, CleanupAlgorithmType::Lru);
        for key in ["A", "B", "C", "D"] {
            cache.write(key.to_string(), 1).ok();
        }
        for key in ["A", "B", "C"] {
            cache.read(&key.to_string());
        }
        let report = cache.cleanup();
        assert_eq!(report.evicted, 1);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.read(&"D".to_string()), None);
    }

    #[test]
    fn test_lfu_evicts_lowest_counts_in_insertion_order() {
        let cache = bounded(2, CleanupAlgorithmType::Lfu);
        for key in ["a", "b", "c", "d"] {
            cache.write(key.to_string(), 0).ok();
        }
        for (key, reads) in [("a", 3), ("b", 1), ("c", 1), ("d", 2)] {
            for _ in 0..reads {
                cache.read(&key.to_string());
            }
        }
        assert_eq!(cache.cleanup().evicted, 2);
        assert_eq!(keys_of(&cache), vec!["a", "d"]);
    }

    #[test]
    fn test_eviction_skips_locked_objects() {
        let cache = bounded(1, CleanupAlgorithmType::Lru);
        cache.write("a".into(), 1).ok();
        cache.write("b".into(), 2).ok();
        let loan = cache.loan(&"a".to_string(), &LoanPolicy::exclusive_write().immutable());
        assert_eq!(cache.cleanup().evicted, 1);
        assert_eq!(keys_of(&cache), vec!["a"]);
        if let Ok(Some(loan)) = loan {
            cache.return_loan(loan);
        }
    }

    #[test]
    fn test_expire_cascades_until_swept() {
        let cache = bounded(10, CleanupAlgorithmType::Lru);
        cache.write("a".into(), 1).ok();
        cache.write("b".into(), 2).ok();
        cache.expire();
        assert!(cache.is_expired());
        assert_eq!(cache.read(&"a".to_string()), None);
        assert!(cache.key_set().is_empty());
        assert_eq!(cache.read_expired().len(), 2);
        assert!(cache.write("c".into(), 3).is_err());

        let report = cache.cleanup();
        assert!(report.cache_expired);
        assert_eq!(report.expired, 2);
        assert_eq!(cache.size(), 0);
        assert!(cache.read_expired().is_empty());
    }

    #[test]
    fn test_object_lifetime() {
        let cache = cache_with(
            CachePolicy::builder()
                .object_lifetime(Duration::from_millis(20))
                .build()
                .data,
        );
        cache.write("old".into(), 1).ok();
        std::thread::sleep(Duration::from_millis(40));
        cache.write("new".into(), 2).ok();

        assert_eq!(cache.read(&"old".to_string()), None);
        assert_eq!(cache.read(&"new".to_string()), Some(2));
        let report = cache.cleanup();
        assert_eq!(report.expired, 1);
        assert_eq!(keys_of(&cache), vec!["new"]);
    }

    #[test]
    fn test_cache_lifetime() {
        let cache = cache_with(
            CachePolicy::builder()
                .data_cache_lifetime(Duration::from_millis(10))
                .build()
                .data,
        );
        cache.write("a".into(), 1).ok();
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.is_expired());
        assert!(cache.cleanup().cache_expired);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_status_snapshot() {
        let cache = bounded(3, CleanupAlgorithmType::Lfu);
        cache.write("a".into(), 1).ok();
        let _loan = cache.loan(&"a".to_string(), &LoanPolicy::shared_read());
        let status = cache.status();
        assert_eq!(status.id, "session/numbers");
        assert_eq!((status.size, status.live, status.loaned), (1, 1, 1));
        assert_eq!(status.max_samples, 3);
        assert!(!status.hard_limit);
        assert_eq!(status.cleanup_algorithm, CleanupAlgorithmType::Lfu);
    }

    #[test]
    fn test_managed_cache_downcast() {
        let cache: Arc<dyn ManagedCache> = Arc::new(bounded(3, CleanupAlgorithmType::Lru));
        assert!(cache.clone().as_any().downcast::<DataCache<String, u32>>().is_ok());
        assert!(cache.as_any().downcast::<DataCache<String, String>>().is_err());
    }
}
