//! Cache factory: the registry of cache masters for one domain
//!
//! Create-or-replace and removal of a master run inside one critical section
//! per factory. Lookups of live masters bypass it. Expiring and clearing a
//! replaced master, and all observer notification, happen after the section
//! is left.

pub mod registry;
pub mod sweep;

pub use registry::DomainRegistry;
pub use sweep::SweepReport;

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::cache::config::{CacheMasterPolicy, CachePolicy};
use crate::cache::data::DataCache;
use crate::cache::master::{lock_guard, CacheMaster};
use crate::cache::observer::{CacheMasterObserver, CacheObserver, ObserverHandle, ObserverList};
use crate::cache::traits::{CacheKey, CacheResult, CacheValue, ManagedCache};
use crate::cache::types::{CacheHandle, DomainCacheId, MasterCacheId, Typename};
use crate::telemetry::snapshot::FactoryStatus;

/// Registry of cache masters within one domain
pub struct CacheFactory {
    domain: DomainCacheId,
    masters: DashMap<MasterCacheId, Arc<CacheMaster>>,
    guard: Mutex<()>,
    master_observers: ObserverList<dyn CacheMasterObserver>,
    /// Handed to every master, and from there to every data cache
    cache_observers: Arc<ObserverList<dyn CacheObserver>>,
}

impl std::fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFactory")
            .field("domain", &self.domain)
            .field("masters", &self.masters.len())
            .finish()
    }
}

impl CacheFactory {
    pub fn new(domain: DomainCacheId) -> Self {
        Self {
            domain,
            masters: DashMap::new(),
            guard: Mutex::new(()),
            master_observers: ObserverList::new(),
            cache_observers: Arc::new(ObserverList::new()),
        }
    }

    #[inline]
    pub fn domain(&self) -> &DomainCacheId {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.masters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    /// The live master for `id`, created when absent or past its lifetime
    pub fn compute_master_if_absent(
        &self,
        id: &MasterCacheId,
        policy: &CacheMasterPolicy,
    ) -> Arc<CacheMaster> {
        if let Some(existing) = self.masters.get(id).map(|e| Arc::clone(e.value())) {
            if !existing.is_expired() {
                return existing;
            }
        }

        let (created, replaced) = {
            let _guard = lock_guard(&self.guard, &self.domain);
            let replaced = match self.masters.get(id).map(|e| Arc::clone(e.value())) {
                Some(existing) if !existing.is_expired() => return existing,
                other => other,
            };
            let created = Arc::new(CacheMaster::with_observers(
                id.clone(),
                *policy,
                Arc::clone(&self.cache_observers),
            ));
            self.masters.insert(id.clone(), Arc::clone(&created));
            (created, replaced)
        };

        if let Some(old) = replaced {
            log::debug!("Replaced expired cache master {} in {}", id, self.domain);
            old.expire_and_clear();
            self.master_observers.notify(|o| o.on_removed_cache_master(&old));
        } else {
            log::debug!("Created cache master {} in {}", id, self.domain);
        }
        self.master_observers.notify(|o| o.on_created_cache_master(&created));
        created
    }

    /// Detach the master for `id`
    ///
    /// The detached master is expired so it accepts no new data caches; its
    /// contents stay readable through expired reads.
    pub fn remove_master(&self, id: &MasterCacheId) -> Option<Arc<CacheMaster>> {
        let removed = {
            let _guard = lock_guard(&self.guard, &self.domain);
            self.masters.remove(id).map(|(_, master)| master)
        }?;
        removed.expire();
        log::debug!("Removed cache master {} from {}", id, self.domain);
        self.master_observers.notify(|o| o.on_removed_cache_master(&removed));
        Some(removed)
    }

    /// Expire and detach `master` if `predicate` holds
    ///
    /// The predicate is evaluated inside the critical section and only while
    /// `master` is still the registered instance, so it cannot race a
    /// concurrent replacement.
    pub fn expire_if_master<F>(&self, master: &Arc<CacheMaster>, predicate: F) -> bool
    where
        F: FnOnce(&CacheMaster) -> bool,
    {
        {
            let _guard = lock_guard(&self.guard, &self.domain);
            let registered = self
                .masters
                .get(master.id())
                .map_or(false, |e| Arc::ptr_eq(e.value(), master));
            if !registered || !predicate(master) {
                return false;
            }
            master.expire();
            self.masters.remove(master.id());
        }
        master.expire_and_clear();
        log::debug!("Expired cache master {} in {}", master.id(), self.domain);
        self.master_observers.notify(|o| o.on_removed_cache_master(master));
        true
    }

    /// Live master for `id`; never creates
    pub fn find_cache(&self, id: &MasterCacheId) -> Option<Arc<CacheMaster>> {
        self.masters
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .filter(|master| !master.is_expired())
    }

    /// Every live data cache named `typename`, across all live masters
    pub fn find_caches_by_name(&self, typename: &Typename) -> Vec<Arc<dyn ManagedCache>> {
        self.masters()
            .iter()
            .filter_map(|master| master.find_cache(typename))
            .collect()
    }

    /// Typed data cache at `handle`; never creates
    pub fn find_data_cache<K: CacheKey, V: CacheValue>(
        &self,
        handle: &CacheHandle,
    ) -> Option<Arc<DataCache<K, V>>> {
        self.find_cache(handle.master())?
            .find_data_cache(handle.data_cache().typename())
    }

    /// Type-erased data cache at `handle`; never creates
    pub fn find_managed_cache(&self, handle: &CacheHandle) -> Option<Arc<dyn ManagedCache>> {
        self.find_cache(handle.master())?
            .find_cache(handle.data_cache().typename())
    }

    /// Get or create master and data cache in one call
    pub fn data_cache<K: CacheKey, V: CacheValue>(
        &self,
        master: &MasterCacheId,
        typename: Typename,
        policy: &CachePolicy,
    ) -> CacheResult<Arc<DataCache<K, V>>> {
        self.compute_master_if_absent(master, &policy.master)
            .compute_if_absent(typename, policy.data)
    }

    /// Snapshot of every registered master
    pub fn masters(&self) -> Vec<Arc<CacheMaster>> {
        self.masters.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn add_master_observer(&self, observer: Arc<dyn CacheMasterObserver>) -> ObserverHandle {
        self.master_observers.add(observer)
    }

    pub fn remove_master_observer(&self, handle: ObserverHandle) -> bool {
        self.master_observers.remove(handle)
    }

    /// Observe every current and future data cache of this factory
    pub fn add_cache_observer(&self, observer: Arc<dyn CacheObserver>) -> ObserverHandle {
        self.cache_observers.add(observer)
    }

    pub fn remove_cache_observer(&self, handle: ObserverHandle) -> bool {
        self.cache_observers.remove(handle)
    }

    pub fn status(&self) -> FactoryStatus {
        let mut masters: Vec<_> = self.masters().iter().map(|m| m.status()).collect();
        masters.sort_by(|a, b| a.id.cmp(&b.id));
        FactoryStatus {
            domain: self.domain.to_string(),
            masters,
        }
    }
}
