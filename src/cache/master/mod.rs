//! Cache master: one session's set of typed data caches
//!
//! Data caches are stored type-erased behind `ManagedCache` and recovered by
//! downcasting. Creating or replacing a data cache happens under the master's
//! guard; lookups of existing caches only touch the `DashMap`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;

use crate::cache::config::{CacheMasterPolicy, DataCachePolicy};
use crate::cache::data::DataCache;
use crate::cache::observer::{CacheObserver, ObserverList};
use crate::cache::policy::PolicyChecker;
use crate::cache::traits::{
    CacheKey, CacheOperationError, CacheResult, CacheValue, CleanupReport, ManagedCache,
};
use crate::cache::types::{elapsed_since, timestamp_nanos, DataCacheId, MasterCacheId, Typename};
use crate::telemetry::snapshot::CacheMasterStatus;

/// Owner of the data caches of one master id
pub struct CacheMaster {
    id: MasterCacheId,
    policy: CacheMasterPolicy,
    created_ns: u64,
    /// Shared with every data cache so their writes count as master activity
    last_modified: Arc<AtomicU64>,
    caches: DashMap<DataCacheId, Arc<dyn ManagedCache>>,
    guard: Mutex<()>,
    expired: AtomicBool,
    cleared: AtomicBool,
    cache_observers: Arc<ObserverList<dyn CacheObserver>>,
}

impl std::fmt::Debug for CacheMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMaster")
            .field("id", &self.id)
            .field("data_caches", &self.caches.len())
            .field("expired", &self.expired.load(Ordering::Relaxed))
            .finish()
    }
}

/// Recover the inner guard of a poisoned critical-section mutex
pub(crate) fn lock_guard<'a>(guard: &'a Mutex<()>, owner: &dyn std::fmt::Display) -> MutexGuard<'a, ()> {
    match guard.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Recovering poisoned guard of {}", owner);
            poisoned.into_inner()
        }
    }
}

fn downcast<K: CacheKey, V: CacheValue>(
    cache: Arc<dyn ManagedCache>,
) -> CacheResult<Arc<DataCache<K, V>>> {
    let id = cache.id().clone();
    cache.as_any().downcast::<DataCache<K, V>>().map_err(|_| {
        CacheOperationError::type_mismatch(format!(
            "{} does not hold {} values",
            id,
            std::any::type_name::<V>()
        ))
    })
}

impl CacheMaster {
    pub fn new(id: MasterCacheId, policy: CacheMasterPolicy) -> Self {
        Self::with_observers(id, policy, Arc::new(ObserverList::new()))
    }

    pub(crate) fn with_observers(
        id: MasterCacheId,
        policy: CacheMasterPolicy,
        cache_observers: Arc<ObserverList<dyn CacheObserver>>,
    ) -> Self {
        let now = timestamp_nanos();
        Self {
            id,
            policy,
            created_ns: now,
            last_modified: Arc::new(AtomicU64::new(now)),
            caches: DashMap::new(),
            guard: Mutex::new(()),
            expired: AtomicBool::new(false),
            cleared: AtomicBool::new(false),
            cache_observers,
        }
    }

    #[inline]
    pub fn id(&self) -> &MasterCacheId {
        &self.id
    }

    #[inline]
    pub fn policy(&self) -> &CacheMasterPolicy {
        &self.policy
    }

    #[inline]
    pub fn created_ns(&self) -> u64 {
        self.created_ns
    }

    #[inline]
    pub fn last_modified_ns(&self) -> u64 {
        self.last_modified.load(Ordering::Acquire)
    }

    /// Time since the last modification of any owned data cache
    pub fn idle_for(&self, now_ns: u64) -> Duration {
        elapsed_since(self.last_modified_ns(), now_ns)
    }

    pub fn is_lifetime_exceeded(&self) -> bool {
        PolicyChecker::is_lifetime_exceeded(&self.policy.lifetime, self.created_ns, timestamp_nanos())
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire) || self.is_lifetime_exceeded()
    }

    /// Whether every owned data cache holds no objects
    pub fn is_empty(&self) -> bool {
        self.caches.iter().all(|entry| entry.value().size() == 0)
    }

    pub fn data_cache_count(&self) -> usize {
        self.caches.len()
    }

    /// Get or create the data cache for `typename`
    ///
    /// An expired data cache is replaced by a fresh one; the old instance is
    /// cleared once it has left the map. An expired master accepts no new
    /// data caches.
    pub fn compute_if_absent<K: CacheKey, V: CacheValue>(
        &self,
        typename: Typename,
        policy: DataCachePolicy,
    ) -> CacheResult<Arc<DataCache<K, V>>> {
        let id = DataCacheId::new(self.id.clone(), typename);
        if let Some(existing) = self.caches.get(&id).map(|e| Arc::clone(e.value())) {
            if !existing.is_expired() && !self.expired.load(Ordering::Acquire) {
                return downcast(existing);
            }
        }

        let (created, replaced) = {
            let _guard = lock_guard(&self.guard, &self.id);
            if self.is_expired() {
                return Err(CacheOperationError::cache_expired(self.id.to_string()));
            }
            let replaced = match self.caches.get(&id).map(|e| Arc::clone(e.value())) {
                Some(existing) if !existing.is_expired() => return downcast(existing),
                Some(existing) => Some(existing),
                None => None,
            };
            let created = Arc::new(DataCache::<K, V>::new(
                id.clone(),
                policy,
                Arc::clone(&self.last_modified),
                Arc::clone(&self.cache_observers),
            ));
            self.caches
                .insert(id.clone(), Arc::clone(&created) as Arc<dyn ManagedCache>);
            (created, replaced)
        };

        self.last_modified.fetch_max(created.created_ns(), Ordering::AcqRel);
        if let Some(old) = replaced {
            log::debug!("Replaced expired data cache {}", id);
            old.expire();
            old.clear();
            self.cache_observers.notify(|o| o.on_removed_cache(&id));
        } else {
            log::debug!("Created data cache {}", id);
        }
        self.cache_observers.notify(|o| o.on_created_cache(&id));
        Ok(created)
    }

    /// Typed lookup; never creates
    pub fn find_data_cache<K: CacheKey, V: CacheValue>(
        &self,
        typename: &Typename,
    ) -> Option<Arc<DataCache<K, V>>> {
        let cache = self.find_cache(typename)?;
        match downcast(cache) {
            Ok(cache) => Some(cache),
            Err(err) => {
                log::debug!("Lookup in {} failed: {}", self.id, err);
                None
            }
        }
    }

    /// Type-erased lookup; never creates
    ///
    /// Expired caches, and every cache of an expired master, read as absent.
    pub fn find_cache(&self, typename: &Typename) -> Option<Arc<dyn ManagedCache>> {
        if self.is_expired() {
            return None;
        }
        let id = DataCacheId::new(self.id.clone(), typename.clone());
        self.caches
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .filter(|cache| !cache.is_expired())
    }

    /// Snapshot of every owned data cache
    pub fn caches(&self) -> Vec<Arc<dyn ManagedCache>> {
        self.caches.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Detach the data cache for `typename`; it is expired and cleared
    pub fn remove_data_cache(&self, typename: &Typename) -> Option<Arc<dyn ManagedCache>> {
        let id = DataCacheId::new(self.id.clone(), typename.clone());
        let removed = {
            let _guard = lock_guard(&self.guard, &self.id);
            self.caches.remove(&id).map(|(_, cache)| cache)
        }?;
        removed.expire();
        removed.clear();
        log::debug!("Removed data cache {}", id);
        self.cache_observers.notify(|o| o.on_removed_cache(&id));
        Some(removed)
    }

    /// Mark the master and every data cache expired
    ///
    /// Contents stay readable through `read_expired` until swept or cleared.
    pub fn expire(&self) {
        {
            let _guard = lock_guard(&self.guard, &self.id);
            if self.expired.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        for cache in self.caches() {
            cache.expire();
        }
        log::debug!("Expired cache master {}", self.id);
    }

    /// Expire the master and empty every data cache
    ///
    /// Clearing happens at most once per master; returns whether this call
    /// performed it.
    pub fn expire_and_clear(&self) -> bool {
        self.expire();
        if self.cleared.swap(true, Ordering::AcqRel) {
            return false;
        }
        for cache in self.caches() {
            cache.clear();
            self.cache_observers.notify(|o| o.on_removed_cache(cache.id()));
        }
        log::debug!("Cleared cache master {}", self.id);
        true
    }

    /// Cleanup pass over every data cache, then drop expired empty ones
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for cache in self.caches() {
            report.absorb(cache.cleanup());
        }
        self.prune_expired_caches();
        report
    }

    /// Detach data caches that are expired and already empty
    pub fn prune_expired_caches(&self) -> usize {
        let mut pruned = Vec::new();
        {
            let _guard = lock_guard(&self.guard, &self.id);
            if self.expired.load(Ordering::Acquire) {
                return 0;
            }
            self.caches.retain(|id, cache| {
                let keep = !(cache.is_expired() && cache.size() == 0);
                if !keep {
                    pruned.push(id.clone());
                }
                keep
            });
        }
        for id in &pruned {
            log::debug!("Pruned expired data cache {}", id);
            self.cache_observers.notify(|o| o.on_removed_cache(id));
        }
        pruned.len()
    }

    pub fn status(&self) -> CacheMasterStatus {
        let mut data_caches: Vec<_> = self.caches().iter().map(|c| c.status()).collect();
        data_caches.sort_by(|a, b| a.id.cmp(&b.id));
        CacheMasterStatus {
            id: self.id.to_string(),
            expired: self.is_expired(),
            created_ns: self.created_ns,
            last_modified_ns: self.last_modified_ns(),
            data_caches,
        }
    }
}
