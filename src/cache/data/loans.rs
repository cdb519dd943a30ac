//! Loan checkout and return for a data cache

use std::sync::Arc;

use dashmap::mapref::entry::Entry;

use super::DataCache;
use crate::cache::config::{LoanPolicy, LoanReturnPolicy, Reservation};
use crate::cache::object::{Loaned, ObjectRoot, Release, WriteOutcome};
use crate::cache::traits::{CacheKey, CacheResult, CacheValue};
use crate::cache::types::timestamp_nanos;

impl<K: CacheKey, V: CacheValue> DataCache<K, V> {
    fn grant(
        &self,
        root: &Arc<ObjectRoot<K, V>>,
        policy: &LoanPolicy,
        now_ns: u64,
    ) -> CacheResult<Option<Loaned<K, V>>> {
        if let Err(err) = root.acquire_loan(policy, now_ns) {
            self.stats.record_loan(false);
            log::warn!("Rejected loan on {:?} in {}: {}", root.key(), self.id, err);
            return Err(err);
        }
        // The root may have been retired while the loan was being taken
        let Some(value) = root.read(now_ns) else {
            root.release_loan();
            return Ok(None);
        };
        self.stats.record_loan(true);
        log::trace!(
            "Loaned {:?} from {} as {:?}",
            root.key(),
            self.id,
            policy.reservation
        );
        Ok(Some(Loaned::new(
            self.handle.clone(),
            root.key().clone(),
            value,
            *policy,
            root.generation(),
            now_ns,
        )))
    }

    /// Check out the value for `key`
    ///
    /// Absent or expired keys yield `Ok(None)`; a reservation that conflicts
    /// with an outstanding loan is rejected immediately.
    pub fn loan(&self, key: &K, policy: &LoanPolicy) -> CacheResult<Option<Loaned<K, V>>> {
        if self.check_expired() {
            return Ok(None);
        }
        let Some(root) = self.root(key) else {
            return Ok(None);
        };
        let now = timestamp_nanos();
        if self.retire_if_outlived(&root, now) {
            return Ok(None);
        }
        self.grant(&root, policy, now)
    }

    /// Create the value when absent and loan it in one step
    ///
    /// A freshly created root is loaned before it becomes visible, so no
    /// other caller can remove or lock it first.
    pub fn compute_if_absent_and_loan<F>(
        &self,
        key: K,
        factory: F,
        policy: &LoanPolicy,
    ) -> CacheResult<Loaned<K, V>>
    where
        F: FnOnce(&K) -> V,
    {
        self.assert_writable()?;
        let mut factory = Some(factory);
        loop {
            let now = timestamp_nanos();
            let existing = match self.roots.entry(key.clone()) {
                Entry::Occupied(entry)
                    if entry.get().is_live() && !self.retire_if_outlived(entry.get(), now) =>
                {
                    Arc::clone(entry.get())
                }
                occupied_or_vacant => {
                    let vacant = matches!(occupied_or_vacant, Entry::Vacant(_));
                    if vacant {
                        self.reserve_slots(1)?;
                    }
                    let Some(factory) = factory.take() else {
                        if vacant {
                            self.release_slots(1);
                        }
                        continue;
                    };
                    let root = Arc::new(self.new_root(key.clone(), factory(&key), now));
                    if let Err(err) = root.acquire_loan(policy, now) {
                        if vacant {
                            self.release_slots(1);
                        }
                        return Err(err);
                    }
                    match occupied_or_vacant {
                        Entry::Occupied(mut entry) => {
                            entry.insert(Arc::clone(&root));
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(Arc::clone(&root));
                        }
                    }

                    self.stats.record_write();
                    self.stats.record_loan(true);
                    let value = root.peek();
                    self.notify_created(&key, &value);
                    self.touch(now);
                    return Ok(Loaned::new(
                        self.handle.clone(),
                        key,
                        value,
                        *policy,
                        root.generation(),
                        now,
                    ));
                }
            };

            if let Some(loaned) = self.grant(&existing, policy, now)? {
                return Ok(loaned);
            }
        }
    }

    /// Hand a loan back
    ///
    /// A changed value held under an `ExclusiveWrite` loan is written back
    /// first. Returns the value now held, the removed value when the last
    /// return triggers `RemoveOnNoLoan`, or `None` when the loaned object is
    /// gone or was replaced since the loan was granted.
    pub fn return_loan(&self, loaned: Loaned<K, V>) -> Option<V> {
        let (key, value, policy, generation, dirty) = loaned.into_parts();
        let root = match self.root(&key) {
            Some(root) if root.generation() == generation => root,
            _ => {
                log::debug!("Stale loan on {:?} returned to {}", key, self.id);
                return None;
            }
        };
        let now = timestamp_nanos();

        if dirty && policy.reservation == Reservation::ExclusiveWrite {
            if let WriteOutcome::Written { changed: true, .. } = root.write_back(value, now) {
                self.stats.record_write();
                if !self.object_observers.is_empty() {
                    self.notify_modified(&key, &root.peek());
                }
                self.touch(now);
            }
        }

        let release = root.release_loan();
        if release != Release::NotLoaned {
            self.stats.record_loan_returned();
        }

        if release == Release::Unrestricted && policy.return_policy == LoanReturnPolicy::RemoveOnNoLoan
        {
            // A locking loan taken after the release keeps the value
            if let Ok(Some(removed)) = root.try_retire_removed(now) {
                self.detach(&root);
                self.stats.record_removals(1);
                log::trace!("Removed {:?} from {} on last loan return", key, self.id);
                self.notify_removed(&key, &removed);
                self.touch(now);
                return Some(removed);
            }
        }

        if root.is_live() {
            Some(root.peek())
        } else {
            None
        }
    }
}
