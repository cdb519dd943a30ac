//! Observer contracts and the subscriber registry
//!
//! Notifications are dispatched synchronously on the caller's thread, always
//! after internal guards are released, over a snapshot of the subscribers.
//! An observer may therefore call back into the cache, but it must not
//! assume the state it is told about is still current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::cache::master::CacheMaster;
use crate::cache::types::DataCacheId;

/// Data-cache lifecycle notifications
pub trait CacheObserver: Send + Sync {
    fn on_created_cache(&self, _cache: &DataCacheId) {}
    fn on_modified_cache(&self, _cache: &DataCacheId) {}
    fn on_cleared_cache(&self, _cache: &DataCacheId) {}
    fn on_removed_cache(&self, _cache: &DataCacheId) {}
}

/// Cache-master lifecycle notifications
pub trait CacheMasterObserver: Send + Sync {
    fn on_created_cache_master(&self, _master: &Arc<CacheMaster>) {}
    fn on_removed_cache_master(&self, _master: &Arc<CacheMaster>) {}
}

/// Per-object notifications from one typed data cache
pub trait ObjectObserver<K, V>: Send + Sync {
    fn on_object_created(&self, _key: &K, _value: &V) {}
    fn on_object_modified(&self, _key: &K, _value: &V) {}
    fn on_object_removed(&self, _key: &K, _value: &V) {}
}

/// Undo/redo notifications carrying the restored value
pub trait MementoObserver<K, V>: Send + Sync {
    fn on_undo(&self, _key: &K, _value: &V) {}
    fn on_redo(&self, _key: &K, _value: &V) {}
}

/// Token returned on registration, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Registry of subscribers of one kind
pub struct ObserverList<T: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Arc<T>)>>,
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList").field("len", &self.len()).finish()
    }
}

impl<T: ?Sized> ObserverList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<T>) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.entries.write() {
            Ok(mut entries) => entries.push((id, observer)),
            Err(poisoned) => poisoned.into_inner().push((id, observer)),
        }
        ObserverHandle(id)
    }

    pub fn remove(&self, handle: ObserverHandle) -> bool {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.0);
        entries.len() != before
    }

    /// Current subscribers, copied so dispatch holds no lock
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.iter().map(|(_, observer)| Arc::clone(observer)).collect()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `notify` for every subscriber in registration order
    pub fn notify<F>(&self, notify: F)
    where
        F: Fn(&T),
    {
        for observer in self.snapshot() {
            notify(&observer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl CacheObserver for Recorder {
        fn on_created_cache(&self, cache: &DataCacheId) {
            if let Ok(mut events) = self.events.lock() {
                events.push(format!("created {}", cache));
            }
        }
    }

    #[test]
    fn test_notify_and_remove() {
        let list: ObserverList<dyn CacheObserver> = ObserverList::new();
        let recorder = Arc::new(Recorder::default());
        let handle = list.add(recorder.clone());
        let id = DataCacheId::new("m".into(), "t".into());

        list.notify(|o| o.on_created_cache(&id));
        assert!(list.remove(handle));
        assert!(!list.remove(handle));
        list.notify(|o| o.on_created_cache(&id));

        let events = recorder.events.lock().map(|e| e.clone()).unwrap_or_default();
        assert_eq!(events, vec!["created m/t".to_string()]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_reentrant_registration_during_dispatch() {
        struct Registering {
            list: Arc<ObserverList<dyn CacheObserver>>,
        }
        impl CacheObserver for Registering {
            fn on_modified_cache(&self, _cache: &DataCacheId) {
                self.list.add(Arc::new(Recorder::default()));
            }
        }

        let list: Arc<ObserverList<dyn CacheObserver>> = Arc::new(ObserverList::new());
        list.add(Arc::new(Registering { list: list.clone() }));
        let id = DataCacheId::new("m".into(), "t".into());
        list.notify(|o| o.on_modified_cache(&id));
        assert_eq!(list.len(), 2);
    }
}
