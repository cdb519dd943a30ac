//! Undo/redo over the per-key history

use super::DataCache;
use crate::cache::traits::{CacheKey, CacheResult, CacheValue};
use crate::cache::types::timestamp_nanos;

#[derive(Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

impl<K: CacheKey, V: CacheValue> DataCache<K, V> {
    fn step(&self, key: &K, step: Step) -> CacheResult<Option<V>> {
        if self.check_expired() {
            return Ok(None);
        }
        let Some(root) = self.root(key) else {
            return Ok(None);
        };
        let now = timestamp_nanos();
        let restored = match step {
            Step::Undo => root.undo(now)?,
            Step::Redo => root.redo(now)?,
        };
        if let Some(value) = &restored {
            self.stats.record_history_step();
            match step {
                Step::Undo => self.memento_observers.notify(|o| o.on_undo(key, value)),
                Step::Redo => self.memento_observers.notify(|o| o.on_redo(key, value)),
            }
            self.touch(now);
        }
        Ok(restored)
    }

    /// Restore the previous value of `key`; `None` when there is no history
    pub fn undo(&self, key: &K) -> CacheResult<Option<V>> {
        self.step(key, Step::Undo)
    }

    /// Re-apply the last undone value of `key`
    pub fn redo(&self, key: &K) -> CacheResult<Option<V>> {
        self.step(key, Step::Redo)
    }

    fn step_all(&self, step: Step) -> usize {
        let mut applied = 0;
        for key in self.key_set() {
            match self.step(&key, step) {
                Ok(Some(_)) => applied += 1,
                Ok(None) => {}
                Err(err) => log::debug!("Skipped history step on {:?} in {}: {}", key, self.id, err),
            }
        }
        applied
    }

    /// One undo step on every live key with history; locked keys are skipped
    pub fn undo_all(&self) -> usize {
        self.step_all(Step::Undo)
    }

    /// One redo step on every live key with redo history
    pub fn redo_all(&self) -> usize {
        self.step_all(Step::Redo)
    }

    /// Undo and redo depths for `key`
    pub fn history_depth(&self, key: &K) -> Option<(usize, usize)> {
        self.root(key).map(|root| root.history_depth())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::cache_with;
    use super::*;
    use crate::cache::config::{CachePolicy, LoanPolicy};
    use crate::cache::observer::MementoObserver;
    use std::sync::{Arc, Mutex};

    fn history_cache(depth: usize) -> DataCache<String, u32> {
        cache_with(CachePolicy::builder().memento_depth(depth).build().data)
    }

    #[test]
    fn test_undo_twice_redo_once() {
        let cache = history_cache(8);
        let key = "k".to_string();
        for value in [1, 2, 3] {
            cache.write(key.clone(), value).ok();
        }
        assert_eq!(cache.undo(&key), Ok(Some(2)));
        assert_eq!(cache.undo(&key), Ok(Some(1)));
        assert_eq!(cache.redo(&key), Ok(Some(2)));
        assert_eq!(cache.read(&key), Some(2));
    }

    #[test]
    fn test_depth_is_bounded() {
        let cache = history_cache(2);
        let key = "k".to_string();
        for value in 0..10 {
            cache.write(key.clone(), value).ok();
        }
        assert_eq!(cache.history_depth(&key), Some((2, 0)));
        assert_eq!(cache.undo(&key), Ok(Some(8)));
        assert_eq!(cache.undo(&key), Ok(Some(7)));
        assert_eq!(cache.undo(&key), Ok(None));
        assert_eq!(cache.history_depth(&key), Some((0, 2)));
    }

    #[test]
    fn test_disabled_history() {
        let cache = history_cache(0);
        let key = "k".to_string();
        cache.write(key.clone(), 1).ok();
        cache.write(key.clone(), 2).ok();
        assert_eq!(cache.undo(&key), Ok(None));
        assert_eq!(cache.undo(&"missing".to_string()), Ok(None));
    }

    #[test]
    fn test_undo_all_skips_locked() {
        let cache = history_cache(4);
        for key in ["a", "b", "c"] {
            cache.write(key.to_string(), 1).ok();
            cache.write(key.to_string(), 2).ok();
        }
        let locked = cache.loan(&"c".to_string(), &LoanPolicy::exclusive_write().immutable());
        assert_eq!(cache.undo_all(), 2);
        assert_eq!(cache.read(&"a".to_string()), Some(1));
        assert_eq!(cache.redo_all(), 2);
        assert_eq!(cache.read(&"b".to_string()), Some(2));
        if let Ok(Some(loan)) = locked {
            cache.return_loan(loan);
        }
        assert_eq!(cache.statistics().history_steps, 4);
    }

    #[test]
    fn test_memento_observer_sees_restored_value() {
        #[derive(Default)]
        struct Steps(Mutex<Vec<(String, u32)>>);
        impl MementoObserver<String, u32> for Steps {
            fn on_undo(&self, _key: &String, value: &u32) {
                if let Ok(mut steps) = self.0.lock() {
                    steps.push(("undo".into(), *value));
                }
            }
            fn on_redo(&self, _key: &String, value: &u32) {
                if let Ok(mut steps) = self.0.lock() {
                    steps.push(("redo".into(), *value));
                }
            }
        }

        let cache = history_cache(4);
        let steps = Arc::new(Steps::default());
        cache.add_memento_observer(steps.clone());
        let key = "k".to_string();
        cache.write(key.clone(), 1).ok();
        cache.write(key.clone(), 2).ok();
        cache.undo(&key).ok();
        cache.redo(&key).ok();
        let seen = steps.0.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec![("undo".to_string(), 1), ("redo".to_string(), 2)]);
    }
}
