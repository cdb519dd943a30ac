//! Storage cell for one key: value, access tracking, loans and history
//!
//! The value and its history sit behind a per-root mutex; access counters and
//! loan state are atomics readable without it. Moving a root into a terminal
//! state also happens under the mutex, so a write either lands before the
//! root is retired or observes the retirement and reports `Retired`. Loans
//! are granted under the same mutex, and every lock check that guards a
//! mutation is made while it is held.

use std::sync::{Mutex, MutexGuard};

use crate::cache::access::{AccessStatus, AccessTracker, ObjectState};
use crate::cache::config::{LoanPolicy, MementoPolicy};
use crate::cache::policy::PolicyChecker;
use crate::cache::traits::{CacheKey, CacheOperationError, CacheResult, CacheValue};

use super::loan::{LoanSnapshot, LoanStatus, Release};
use super::memento::Memento;

#[derive(Debug)]
struct ObjectCell<V> {
    value: V,
    memento: Memento<V>,
}

/// Result of a write attempt against one root
#[derive(Debug, PartialEq)]
pub enum WriteOutcome<V> {
    /// The value was stored; `previous` is what it replaced
    Written { previous: V, changed: bool },
    /// A write condition did not hold; the offered value is handed back
    Skipped(V),
    /// The root was retired concurrently; the offered value is handed back
    Retired(V),
}

/// Per-key storage cell
#[derive(Debug)]
pub struct ObjectRoot<K, V> {
    key: K,
    generation: u64,
    access: AccessTracker,
    loans: LoanStatus,
    cell: Mutex<ObjectCell<V>>,
}

impl<K: CacheKey, V: CacheValue> ObjectRoot<K, V> {
    pub fn new(key: K, value: V, generation: u64, memento: MementoPolicy, now_ns: u64) -> Self {
        Self {
            key,
            generation,
            access: AccessTracker::new(now_ns),
            loans: LoanStatus::new(),
            cell: Mutex::new(ObjectCell {
                value,
                memento: Memento::new(memento),
            }),
        }
    }

    fn lock_cell(&self) -> MutexGuard<'_, ObjectCell<V>> {
        match self.cell.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering poisoned object root for key {:?}", self.key);
                poisoned.into_inner()
            }
        }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Unique sequence number; also the insertion order within a cache
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn access(&self) -> &AccessTracker {
        &self.access
    }

    #[inline]
    pub fn loans(&self) -> &LoanStatus {
        &self.loans
    }

    #[inline]
    pub fn state(&self) -> ObjectState {
        self.access.state()
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.access.is_terminal()
    }

    pub fn status(&self) -> AccessStatus {
        self.access.snapshot()
    }

    pub fn loan_status(&self) -> LoanSnapshot {
        self.loans.snapshot()
    }

    /// Read the value, recording the access; `None` once retired
    pub fn read(&self, now_ns: u64) -> Option<V> {
        let value = {
            let cell = self.lock_cell();
            if self.access.is_terminal() {
                return None;
            }
            cell.value.clone()
        };
        self.access.on_read(now_ns);
        Some(value)
    }

    /// Copy of the value without touching access bookkeeping
    pub fn peek(&self) -> V {
        self.lock_cell().value.clone()
    }

    /// Store `value` when `condition` accepts the current one
    pub fn write_if<F>(&self, value: V, condition: F, now_ns: u64) -> CacheResult<WriteOutcome<V>>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut cell = self.lock_cell();
        PolicyChecker::assert_overwrite_possible(&self.loans)?;
        Ok(self.store(&mut cell, value, condition, now_ns))
    }

    /// Store `value` unconditionally (subject to loan restrictions)
    pub fn write(&self, value: V, now_ns: u64) -> CacheResult<WriteOutcome<V>> {
        self.write_if(value, |_| true, now_ns)
    }

    fn store<F>(
        &self,
        cell: &mut ObjectCell<V>,
        value: V,
        condition: F,
        now_ns: u64,
    ) -> WriteOutcome<V>
    where
        F: FnOnce(&V) -> bool,
    {
        if self.access.is_terminal() {
            return WriteOutcome::Retired(value);
        }
        if !condition(&cell.value) {
            return WriteOutcome::Skipped(value);
        }
        let changed = cell.value != value;
        let previous = std::mem::replace(&mut cell.value, value);
        if changed {
            cell.memento.record_write(previous.clone());
        }
        self.access.on_write(changed, now_ns);
        WriteOutcome::Written { previous, changed }
    }

    /// Restore the previous value from history
    pub fn undo(&self, now_ns: u64) -> CacheResult<Option<V>> {
        let mut cell = self.lock_cell();
        PolicyChecker::assert_overwrite_possible(&self.loans)?;
        if self.access.is_terminal() {
            return Ok(None);
        }
        let current = cell.value.clone();
        match cell.memento.undo(current) {
            Ok(previous) => {
                cell.value = previous.clone();
                self.access.on_write(true, now_ns);
                Ok(Some(previous))
            }
            Err(_) => Ok(None),
        }
    }

    /// Re-apply a value undone earlier
    pub fn redo(&self, now_ns: u64) -> CacheResult<Option<V>> {
        let mut cell = self.lock_cell();
        PolicyChecker::assert_overwrite_possible(&self.loans)?;
        if self.access.is_terminal() {
            return Ok(None);
        }
        let current = cell.value.clone();
        match cell.memento.redo(current) {
            Ok(next) => {
                cell.value = next.clone();
                self.access.on_write(true, now_ns);
                Ok(Some(next))
            }
            Err(_) => Ok(None),
        }
    }

    /// Undo/redo stack depths
    pub fn history_depth(&self) -> (usize, usize) {
        let cell = self.lock_cell();
        (cell.memento.undo_depth(), cell.memento.redo_depth())
    }

    fn retire_cell(&self, cell: &mut ObjectCell<V>, now_ns: u64) -> Option<V> {
        if self.access.mark_removed(now_ns) {
            cell.memento.clear();
            Some(cell.value.clone())
        } else {
            None
        }
    }

    /// Move into `Removed` regardless of loans; returns the value if this
    /// call retired the root
    pub fn retire_removed(&self, now_ns: u64) -> Option<V> {
        let mut cell = self.lock_cell();
        self.retire_cell(&mut cell, now_ns)
    }

    /// Move into `Removed` unless an exclusive immutable loan holds the root
    pub fn try_retire_removed(&self, now_ns: u64) -> CacheResult<Option<V>> {
        let mut cell = self.lock_cell();
        PolicyChecker::assert_removal_possible(&self.loans)?;
        Ok(self.retire_cell(&mut cell, now_ns))
    }

    /// Move into `Expired`; returns whether this call expired the root
    pub fn retire_expired(&self, now_ns: u64) -> bool {
        let _cell = self.lock_cell();
        self.access.mark_expired(now_ns)
    }

    /// Try to grant a loan; the error carries the conflicting reservation
    ///
    /// Loans are granted under the cell guard, so a locking loan can never
    /// land between the lock check and the mutation of a write or removal.
    pub fn acquire_loan(&self, policy: &LoanPolicy, now_ns: u64) -> CacheResult<u64> {
        let _cell = self.lock_cell();
        PolicyChecker::assert_loan_possible(&self.loans, policy)?;
        self.loans.try_acquire(policy, now_ns).map_err(|held| {
            CacheOperationError::loan_conflict(format!(
                "{:?} requested while {:?} is held on {:?}",
                policy.reservation, held, self.key
            ))
        })
    }

    /// Write back a value changed under an exclusive loan, bypassing the
    /// immutability lock held by that same loan
    pub fn write_back(&self, value: V, now_ns: u64) -> WriteOutcome<V> {
        let mut cell = self.lock_cell();
        self.store(&mut cell, value, |_| true, now_ns)
    }

    pub fn release_loan(&self) -> Release {
        self.loans.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(depth: usize) -> ObjectRoot<&'static str, u32> {
        ObjectRoot::new("k", 1, 7, MementoPolicy::with_depth(depth), 100)
    }

    #[test]
    fn test_read_records_access() {
        let root = root(0);
        assert_eq!(root.read(200), Some(1));
        let status = root.status();
        assert_eq!(status.state, ObjectState::Read);
        assert_eq!(status.count.reads, 1);
        assert_eq!(root.generation(), 7);
    }

    #[test]
    fn test_write_distinguishes_changes() {
        let root = root(0);
        assert_eq!(
            root.write(2, 200),
            Ok(WriteOutcome::Written { previous: 1, changed: true })
        );
        assert_eq!(root.state(), ObjectState::Modified);
        assert_eq!(
            root.write(2, 300),
            Ok(WriteOutcome::Written { previous: 2, changed: false })
        );
        assert_eq!(root.state(), ObjectState::NotModified);
    }

    #[test]
    fn test_write_if_condition() {
        let root = root(0);
        assert_eq!(root.write_if(5, |v| *v == 9, 200), Ok(WriteOutcome::Skipped(5)));
        assert_eq!(root.peek(), 1);
        assert!(matches!(
            root.write_if(5, |v| *v == 1, 300),
            Ok(WriteOutcome::Written { previous: 1, .. })
        ));
    }

    #[test]
    fn test_retired_root_rejects_reads_and_writes() {
        let root = root(0);
        assert_eq!(root.retire_removed(200), Some(1));
        assert_eq!(root.retire_removed(300), None);
        assert!(!root.retire_expired(300));
        assert_eq!(root.read(400), None);
        assert_eq!(root.write(3, 500), Ok(WriteOutcome::Retired(3)));
        assert_eq!(root.peek(), 1);
    }

    #[test]
    fn test_undo_redo_through_root() {
        let root = root(4);
        let _ = root.write(2, 200);
        let _ = root.write(3, 300);
        assert_eq!(root.undo(400), Ok(Some(2)));
        assert_eq!(root.undo(500), Ok(Some(1)));
        assert_eq!(root.undo(600), Ok(None));
        assert_eq!(root.redo(700), Ok(Some(2)));
        assert_eq!(root.peek(), 2);
        assert_eq!(root.history_depth(), (1, 1));
    }

    #[test]
    fn test_locked_root_rejects_overwrite_but_allows_write_back() {
        let root = root(0);
        let policy = LoanPolicy::exclusive_write().immutable();
        assert_eq!(root.acquire_loan(&policy, 200), Ok(1));
        assert!(root.write(9, 300).is_err());
        assert!(root.undo(300).is_err());
        assert!(root.acquire_loan(&LoanPolicy::shared_read(), 300).is_err());
        assert!(matches!(root.write_back(9, 400), WriteOutcome::Written { .. }));
        assert_eq!(root.release_loan(), Release::Unrestricted);
        assert!(root.write(10, 500).is_ok());
    }

    #[test]
    fn test_locked_root_refuses_checked_removal() {
        let root = root(0);
        let policy = LoanPolicy::exclusive_write().immutable();
        assert!(root.acquire_loan(&policy, 200).is_ok());
        assert!(root.try_retire_removed(300).is_err());
        assert!(root.is_live());
        root.release_loan();
        assert_eq!(root.try_retire_removed(400), Ok(Some(1)));
        assert_eq!(root.try_retire_removed(500), Ok(None));
    }

    #[test]
    fn test_locking_loan_sees_stable_value_under_concurrent_writers() {
        let root = root(4);
        let policy = LoanPolicy::exclusive_write().immutable();
        std::thread::scope(|s| {
            for writer in 0..3u32 {
                let root = &root;
                s.spawn(move || {
                    for i in 0..2_000 {
                        let _ = root.write(writer * 10_000 + i, 0);
                        let _ = root.undo(0);
                    }
                });
            }
            let root = &root;
            s.spawn(move || {
                for _ in 0..2_000 {
                    if root.acquire_loan(&policy, 0).is_ok() {
                        let seen = root.peek();
                        for _ in 0..8 {
                            assert_eq!(root.peek(), seen);
                        }
                        root.release_loan();
                    }
                }
            });
        });
    }
}
