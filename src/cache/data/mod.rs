//! Typed data cache: the keyed collection of object roots for one type
//!
//! Roots live in a `DashMap`, so operations on different keys never contend
//! beyond a shard lock. Per-key value access goes through the root's own
//! mutex, and loan state is lock-free. Observers are always notified after
//! every map guard has been dropped.

mod cleanup;
mod history;
mod loans;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cache::access::{AccessStatus, ObjectState};
use crate::cache::config::DataCachePolicy;
use crate::cache::object::{LoanSnapshot, ObjectRoot, WriteOutcome};
use crate::cache::observer::{
    CacheObserver, MementoObserver, ObjectObserver, ObserverHandle, ObserverList,
};
use crate::cache::policy::PolicyChecker;
use crate::cache::traits::{CacheKey, CacheOperationError, CacheResult, CacheValue};
use crate::cache::types::{timestamp_nanos, CacheHandle, DataCacheId};
use crate::telemetry::snapshot::AccessStatusSnapshot;
use crate::telemetry::stats::{CacheStatistics, CacheStatisticsSnapshot};

/// Generation source shared by every data cache in the process
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Keyed collection of object roots sharing one policy
pub struct DataCache<K, V> {
    id: DataCacheId,
    handle: CacheHandle,
    policy: DataCachePolicy,
    roots: DashMap<K, Arc<ObjectRoot<K, V>>>,
    /// Roots present in the map; slots are reserved here before insertion
    population: AtomicUsize,
    created_ns: u64,
    last_modified_ns: AtomicU64,
    /// Activity stamp of the owning master
    master_activity: Arc<AtomicU64>,
    expired: AtomicBool,
    cache_observers: Arc<ObserverList<dyn CacheObserver>>,
    object_observers: ObserverList<dyn ObjectObserver<K, V>>,
    memento_observers: ObserverList<dyn MementoObserver<K, V>>,
    stats: CacheStatistics,
}

impl<K: CacheKey, V> std::fmt::Debug for DataCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("id", &self.id)
            .field("size", &self.roots.len())
            .field("expired", &self.expired.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K: CacheKey, V: CacheValue> DataCache<K, V> {
    pub(crate) fn new(
        id: DataCacheId,
        policy: DataCachePolicy,
        master_activity: Arc<AtomicU64>,
        cache_observers: Arc<ObserverList<dyn CacheObserver>>,
    ) -> Self {
        let now = timestamp_nanos();
        Self {
            handle: CacheHandle::new(id.clone()),
            id,
            policy,
            roots: DashMap::new(),
            population: AtomicUsize::new(0),
            created_ns: now,
            last_modified_ns: AtomicU64::new(now),
            master_activity,
            expired: AtomicBool::new(false),
            cache_observers,
            object_observers: ObserverList::new(),
            memento_observers: ObserverList::new(),
            stats: CacheStatistics::new(),
        }
    }

    /// Standalone data cache with no owning master
    pub fn detached(id: DataCacheId, policy: DataCachePolicy) -> Self {
        Self::new(
            id,
            policy,
            Arc::new(AtomicU64::new(timestamp_nanos())),
            Arc::new(ObserverList::new()),
        )
    }

    #[inline]
    pub fn id(&self) -> &DataCacheId {
        &self.id
    }

    #[inline]
    pub fn handle(&self) -> &CacheHandle {
        &self.handle
    }

    #[inline]
    pub fn policy(&self) -> &DataCachePolicy {
        &self.policy
    }

    /// Number of object roots held, including retired ones awaiting sweep
    #[inline]
    pub fn size(&self) -> usize {
        self.roots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    #[inline]
    pub fn created_ns(&self) -> u64 {
        self.created_ns
    }

    #[inline]
    pub fn last_modified_ns(&self) -> u64 {
        self.last_modified_ns.load(Ordering::Acquire)
    }

    pub fn statistics(&self) -> CacheStatisticsSnapshot {
        self.stats.snapshot()
    }

    fn root(&self, key: &K) -> Option<Arc<ObjectRoot<K, V>>> {
        self.roots.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn new_root(&self, key: K, value: V, now_ns: u64) -> ObjectRoot<K, V> {
        ObjectRoot::new(key, value, next_generation(), self.policy.memento, now_ns)
    }

    fn roots_snapshot(&self) -> Vec<Arc<ObjectRoot<K, V>>> {
        self.roots.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Reserve room for `additional` roots, honoring hard limits
    fn reserve_slots(&self, additional: usize) -> CacheResult<()> {
        let mut current = self.population.load(Ordering::Acquire);
        loop {
            if let Err(err) = PolicyChecker::assert_writing_possible(
                &self.id,
                current,
                additional,
                &self.policy.resource_limits,
            ) {
                self.stats.record_rejected_write();
                return Err(err);
            }
            match self.population.compare_exchange_weak(
                current,
                current + additional,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn release_slots(&self, count: usize) {
        self.population.fetch_sub(count, Ordering::AcqRel);
    }

    /// Drop `root` from the map if it is still the entry for its key
    fn detach(&self, root: &Arc<ObjectRoot<K, V>>) -> bool {
        let removed = self
            .roots
            .remove_if(root.key(), |_, current| Arc::ptr_eq(current, root))
            .is_some();
        if removed {
            self.release_slots(1);
        }
        removed
    }

    fn touch(&self, now_ns: u64) {
        self.last_modified_ns.fetch_max(now_ns, Ordering::AcqRel);
        self.master_activity.fetch_max(now_ns, Ordering::AcqRel);
        self.cache_observers.notify(|o| o.on_modified_cache(&self.id));
    }

    fn notify_created(&self, key: &K, value: &V) {
        self.object_observers.notify(|o| o.on_object_created(key, value));
    }

    fn notify_modified(&self, key: &K, value: &V) {
        self.object_observers.notify(|o| o.on_object_modified(key, value));
    }

    fn notify_removed(&self, key: &K, value: &V) {
        self.object_observers.notify(|o| o.on_object_removed(key, value));
    }

    fn assert_writable(&self) -> CacheResult<()> {
        if self.check_expired() {
            return Err(CacheOperationError::cache_expired(self.id.to_string()));
        }
        Ok(())
    }

    /// Whether the object outlived the per-object lifetime; retires it if so
    fn retire_if_outlived(&self, root: &ObjectRoot<K, V>, now_ns: u64) -> bool {
        if PolicyChecker::is_lifetime_exceeded(
            &self.policy.object_lifetime,
            root.access().created_ns(),
            now_ns,
        ) {
            if root.retire_expired(now_ns) {
                log::trace!("Object {:?} in {} outlived its lifetime", root.key(), self.id);
            }
            return true;
        }
        false
    }

    // ---- reads ----

    /// Live value for `key`, recording the read
    pub fn read(&self, key: &K) -> Option<V> {
        let value = if self.check_expired() {
            None
        } else {
            self.root(key).and_then(|root| {
                let now = timestamp_nanos();
                if self.retire_if_outlived(&root, now) {
                    None
                } else {
                    root.read(now)
                }
            })
        };
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Every live key/value pair, each counted as a read
    pub fn read_all(&self) -> Vec<(K, V)> {
        if self.check_expired() {
            return Vec::new();
        }
        let now = timestamp_nanos();
        self.roots_snapshot()
            .into_iter()
            .filter(|root| !self.retire_if_outlived(root, now))
            .filter_map(|root| root.read(now).map(|value| (root.key().clone(), value)))
            .collect()
    }

    /// Values of objects that expired but have not been swept yet
    pub fn read_expired(&self) -> Vec<(K, V)> {
        self.roots_snapshot()
            .into_iter()
            .filter(|root| root.state() == ObjectState::Expired)
            .map(|root| (root.key().clone(), root.peek()))
            .collect()
    }

    /// Keys of live objects
    pub fn key_set(&self) -> Vec<K> {
        self.roots
            .iter()
            .filter(|entry| entry.value().is_live())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.root(key).map_or(false, |root| root.is_live())
    }

    // ---- writes ----

    /// Store `value` under `key`, returning the value it replaced
    pub fn write(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.assert_writable()?;
        let mut value = value;
        loop {
            let now = timestamp_nanos();
            let existing = match self.roots.entry(key.clone()) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    self.reserve_slots(1)?;
                    let root = self.new_root(key.clone(), value, now);
                    let inserted = Arc::clone(entry.insert(Arc::new(root)).value());
                    self.stats.record_write();
                    log::trace!("Created {:?} in {}", key, self.id);
                    if !self.object_observers.is_empty() {
                        self.notify_created(&key, &inserted.peek());
                    }
                    self.touch(now);
                    return Ok(None);
                }
            };

            match existing.write(value, now) {
                Ok(WriteOutcome::Written { previous, changed }) => {
                    self.stats.record_write();
                    if changed {
                        if !self.object_observers.is_empty() {
                            self.notify_modified(&key, &existing.peek());
                        }
                        self.touch(now);
                    }
                    return Ok(Some(previous));
                }
                Ok(WriteOutcome::Retired(returned)) | Ok(WriteOutcome::Skipped(returned)) => {
                    // Replace the retired root with a fresh one
                    self.detach(&existing);
                    value = returned;
                }
                Err(err) => {
                    self.stats.record_rejected_write();
                    log::warn!("Rejected write of {:?} in {}: {}", key, self.id, err);
                    return Err(err);
                }
            }
        }
    }

    /// Value for `key`, created by `factory` when absent
    ///
    /// The factory runs while the key's shard is locked, so it must not call
    /// back into this data cache.
    pub fn compute_if_absent<F>(&self, key: K, factory: F) -> CacheResult<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.assert_writable()?;
        let mut factory = Some(factory);
        loop {
            let now = timestamp_nanos();
            let (root, created) = match self.roots.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    // An outlived root counts as absent
                    if entry.get().is_live() && !self.retire_if_outlived(entry.get(), now) {
                        (Arc::clone(entry.get()), false)
                    } else {
                        let Some(factory) = factory.take() else {
                            continue;
                        };
                        let root = Arc::new(self.new_root(key.clone(), factory(&key), now));
                        entry.insert(Arc::clone(&root));
                        (root, true)
                    }
                }
                Entry::Vacant(entry) => {
                    self.reserve_slots(1)?;
                    let Some(factory) = factory.take() else {
                        self.release_slots(1);
                        continue;
                    };
                    let root = Arc::new(self.new_root(key.clone(), factory(&key), now));
                    entry.insert(Arc::clone(&root));
                    (root, true)
                }
            };

            if created {
                self.stats.record_write();
                let value = root.peek();
                self.notify_created(&key, &value);
                self.touch(now);
                return Ok(value);
            }
            if let Some(value) = root.read(now) {
                self.stats.record_hit();
                return Ok(value);
            }
            // Retired between lookup and read; the next round replaces it
        }
    }

    /// Store `value` only if the current value equals `expected`
    pub fn compare_and_write(&self, key: &K, expected: &V, value: V) -> CacheResult<bool> {
        self.assert_writable()?;
        let Some(root) = self.root(key) else {
            return Ok(false);
        };
        let now = timestamp_nanos();
        match root.write_if(value, |current| current == expected, now) {
            Ok(WriteOutcome::Written { changed, .. }) => {
                self.stats.record_write();
                if changed {
                    if !self.object_observers.is_empty() {
                        self.notify_modified(key, &root.peek());
                    }
                    self.touch(now);
                }
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(err) => {
                self.stats.record_rejected_write();
                Err(err)
            }
        }
    }

    // ---- removal ----

    /// Remove `key`; removing an absent key is a no-op
    pub fn take(&self, key: &K) -> CacheResult<Option<V>> {
        let Some(root) = self.root(key) else {
            return Ok(None);
        };
        let now = timestamp_nanos();
        let taken = root.try_retire_removed(now)?;
        if root.state() == ObjectState::Removed {
            self.detach(&root);
        }
        if let Some(value) = &taken {
            self.stats.record_removals(1);
            log::trace!("Took {:?} from {}", key, self.id);
            self.notify_removed(key, value);
            self.touch(now);
        }
        Ok(taken)
    }

    /// Remove every live object that is not locked by a loan
    pub fn take_all(&self) -> Vec<(K, V)> {
        let now = timestamp_nanos();
        let mut taken = Vec::new();
        for root in self.roots_snapshot() {
            // Locked roots are refused
            if let Ok(Some(value)) = root.try_retire_removed(now) {
                self.detach(&root);
                taken.push((root.key().clone(), value));
            }
        }
        if !taken.is_empty() {
            self.stats.record_removals(taken.len());
            for (key, value) in &taken {
                self.notify_removed(key, value);
            }
            self.touch(now);
        }
        taken
    }

    /// Remove every object already in a terminal state
    pub fn take_expired(&self) -> Vec<(K, V)> {
        let mut taken = Vec::new();
        for root in self.roots_snapshot() {
            if root.is_live() {
                continue;
            }
            if self.detach(&root) {
                taken.push((root.key().clone(), root.peek()));
            }
        }
        if !taken.is_empty() {
            self.stats.record_expirations(taken.len());
            log::debug!("Swept {} retired object(s) from {}", taken.len(), self.id);
        }
        taken
    }

    /// Drop every object root regardless of loans
    pub fn clear(&self) {
        let now = timestamp_nanos();
        let mut removed = 0;
        for root in self.roots_snapshot() {
            root.retire_removed(now);
            if self.detach(&root) {
                removed += 1;
            }
        }
        self.stats.record_removals(removed);
        log::debug!("Cleared {} object(s) from {}", removed, self.id);
        self.cache_observers.notify(|o| o.on_cleared_cache(&self.id));
        self.touch(now);
    }

    // ---- monitoring ----

    /// Access bookkeeping of one key, without recording an access
    pub fn access_status(&self, key: &K) -> Option<AccessStatus> {
        self.root(key).map(|root| root.status())
    }

    pub fn loan_status(&self, key: &K) -> Option<LoanSnapshot> {
        self.root(key).map(|root| root.loan_status())
    }

    pub fn object_status(&self, key: &K) -> Option<AccessStatusSnapshot> {
        self.root(key).map(|root| {
            let (undo_depth, redo_depth) = root.history_depth();
            AccessStatusSnapshot {
                key: format!("{:?}", root.key()),
                generation: root.generation(),
                access: root.status(),
                loan: root.loan_status(),
                undo_depth,
                redo_depth,
            }
        })
    }

    // ---- observers ----

    pub fn add_object_observer(&self, observer: Arc<dyn ObjectObserver<K, V>>) -> ObserverHandle {
        self.object_observers.add(observer)
    }

    pub fn remove_object_observer(&self, handle: ObserverHandle) -> bool {
        self.object_observers.remove(handle)
    }

    pub fn add_memento_observer(&self, observer: Arc<dyn MementoObserver<K, V>>) -> ObserverHandle {
        self.memento_observers.add(observer)
    }

    pub fn remove_memento_observer(&self, handle: ObserverHandle) -> bool {
        self.memento_observers.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::{CachePolicy, ResourceLimits};
    use std::sync::Mutex;

    pub(super) fn cache_with(policy: DataCachePolicy) -> DataCache<String, u32> {
        DataCache::detached(DataCacheId::new("session".into(), "numbers".into()), policy)
    }

    pub(super) fn cache() -> DataCache<String, u32> {
        cache_with(DataCachePolicy::default())
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl Events {
        fn push(&self, event: String) {
            if let Ok(mut events) = self.0.lock() {
                events.push(event);
            }
        }

        fn take(&self) -> Vec<String> {
            self.0.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
        }
    }

    impl ObjectObserver<String, u32> for Events {
        fn on_object_created(&self, key: &String, value: &u32) {
            self.push(format!("created {}={}", key, value));
        }
        fn on_object_modified(&self, key: &String, value: &u32) {
            self.push(format!("modified {}={}", key, value));
        }
        fn on_object_removed(&self, key: &String, value: &u32) {
            self.push(format!("removed {}={}", key, value));
        }
    }

    #[test]
    fn test_write_read_replace() {
        let cache = cache();
        assert_eq!(cache.write("a".into(), 1), Ok(None));
        assert_eq!(cache.write("a".into(), 2), Ok(Some(1)));
        assert_eq!(cache.read(&"a".to_string()), Some(2));
        assert_eq!(cache.read(&"b".to_string()), None);
        assert_eq!(cache.size(), 1);

        let stats = cache.statistics();
        assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 2));
    }

    #[test]
    fn test_access_state_follows_writes() {
        use crate::cache::access::ObjectState;
        let cache = cache();
        let key = "a".to_string();
        cache.write(key.clone(), 1).ok();
        assert_eq!(cache.access_status(&key).map(|s| s.state), Some(ObjectState::Write));
        cache.write(key.clone(), 1).ok();
        assert_eq!(
            cache.access_status(&key).map(|s| s.state),
            Some(ObjectState::NotModified)
        );
        cache.write(key.clone(), 5).ok();
        let status = cache.access_status(&key);
        assert_eq!(status.map(|s| s.state), Some(ObjectState::Modified));
        assert_eq!(status.map(|s| s.count.modifications), Some(1));
    }

    #[test]
    fn test_hard_limit_rejects_and_keeps_size() {
        let cache = cache_with(CachePolicy::builder().hard_max_samples(2).build().data);
        cache.write("a".into(), 1).ok();
        cache.write("b".into(), 2).ok();
        let rejected = cache.write("c".into(), 3);
        assert!(matches!(
            rejected,
            Err(CacheOperationError::CapacityExceeded { current: 2, max: 2, .. })
        ));
        assert_eq!(cache.size(), 2);
        // overwriting an existing key adds nothing
        assert_eq!(cache.write("a".into(), 9), Ok(Some(1)));
        assert_eq!(cache.statistics().rejected_writes, 1);
    }

    #[test]
    fn test_hard_limit_under_concurrency() {
        let cache = cache_with(DataCachePolicy {
            resource_limits: ResourceLimits::hard(10),
            ..DataCachePolicy::default()
        });
        std::thread::scope(|scope| {
            for t in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..20 {
                        let _ = cache.write(format!("{}-{}", t, i), i);
                    }
                });
            }
        });
        assert_eq!(cache.size(), 10);
    }

    #[test]
    fn test_take_is_idempotent() {
        let cache = cache();
        let key = "a".to_string();
        cache.write(key.clone(), 7).ok();
        assert_eq!(cache.take(&key), Ok(Some(7)));
        assert_eq!(cache.take(&key), Ok(None));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.read(&key), None);
    }

    #[test]
    fn test_compute_if_absent_runs_factory_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let (cache, calls) = (&cache, &calls);
                scope.spawn(move || {
                    let value = cache.compute_if_absent("k".into(), |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        42
                    });
                    assert_eq!(value, Ok(42));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compare_and_write() {
        let cache = cache();
        let key = "a".to_string();
        assert_eq!(cache.compare_and_write(&key, &0, 1), Ok(false));
        cache.write(key.clone(), 1).ok();
        assert_eq!(cache.compare_and_write(&key, &5, 2), Ok(false));
        assert_eq!(cache.compare_and_write(&key, &1, 2), Ok(true));
        assert_eq!(cache.read(&key), Some(2));
    }

    #[test]
    fn test_object_observers() {
        let cache = cache();
        let events = Arc::new(Events::default());
        let handle = cache.add_object_observer(events.clone());
        cache.write("a".into(), 1).ok();
        cache.write("a".into(), 2).ok();
        cache.write("a".into(), 2).ok();
        cache.take(&"a".to_string()).ok();
        assert_eq!(
            events.take(),
            vec!["created a=1", "modified a=2", "removed a=2"]
        );
        assert!(cache.remove_object_observer(handle));
        cache.write("b".into(), 1).ok();
        assert!(events.take().is_empty());
    }

    #[test]
    fn test_take_all_and_key_set() {
        let cache = cache();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.write(key.to_string(), i as u32).ok();
        }
        let mut keys = cache.key_set();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(cache.read_all().len(), 3);
        assert_eq!(cache.take_all().len(), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_notifies() {
        struct Cleared(AtomicUsize);
        impl CacheObserver for Cleared {
            fn on_cleared_cache(&self, _cache: &DataCacheId) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let observers: Arc<ObserverList<dyn CacheObserver>> = Arc::new(ObserverList::new());
        let cleared = Arc::new(Cleared(AtomicUsize::new(0)));
        observers.add(cleared.clone());
        let cache: DataCache<u32, u32> = DataCache::new(
            DataCacheId::new("m".into(), "t".into()),
            DataCachePolicy::default(),
            Arc::new(AtomicU64::new(0)),
            observers,
        );
        cache.write(1, 1).ok();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cleared.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_writes_touch_master_activity() {
        let activity = Arc::new(AtomicU64::new(0));
        let cache: DataCache<u32, u32> = DataCache::new(
            DataCacheId::new("m".into(), "t".into()),
            DataCachePolicy::default(),
            activity.clone(),
            Arc::new(ObserverList::new()),
        );
        cache.write(1, 1).ok();
        assert!(activity.load(Ordering::SeqCst) > 0);
        assert_eq!(activity.load(Ordering::SeqCst), cache.last_modified_ns());
    }

    #[test]
    fn test_compute_if_absent_replaces_outlived_object() {
        let cache = cache_with(
            CachePolicy::builder()
                .object_lifetime(std::time::Duration::from_millis(20))
                .build()
                .data,
        );
        let key = "k".to_string();
        cache.write(key.clone(), 1).ok();
        std::thread::sleep(std::time::Duration::from_millis(40));

        assert_eq!(cache.compute_if_absent(key.clone(), |_| 2), Ok(2));
        assert_eq!(cache.read(&key), Some(2));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_debug_reports_size() {
        let cache = cache();
        cache.write("a".into(), 1).ok();
        let rendered = format!("{:?}", cache);
        assert!(rendered.starts_with("DataCache"));
        assert!(rendered.contains("size: 1"));
    }
}
