//! Loan bookkeeping for one object root
//!
//! The holder count and reservation flags share a single `AtomicU64`, so loan
//! acceptance is one compare-and-swap that either succeeds or reports a
//! conflict immediately. Nothing here ever waits for a loan to be returned.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::config::{LoanPolicy, Reservation};
use crate::cache::types::CacheHandle;

const HOLDERS_MASK: u64 = 0xFFFF_FFFF;
const EXCLUSIVE_BIT: u64 = 1 << 32;
const LOCKED_BIT: u64 = 1 << 33;

#[inline(always)]
fn holders_of(word: u64) -> u64 {
    word & HOLDERS_MASK
}

#[inline(always)]
fn outstanding_of(word: u64) -> Reservation {
    if word & EXCLUSIVE_BIT != 0 {
        Reservation::ExclusiveWrite
    } else if holders_of(word) > 0 {
        Reservation::SharedRead
    } else {
        Reservation::None
    }
}

/// Outcome of returning one loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other holders remain
    StillLoaned(u64),
    /// That was the last outstanding loan
    Unrestricted,
    /// Nothing was outstanding
    NotLoaned,
}

/// Lock-free loan status of one object
#[derive(Debug, Default)]
pub struct LoanStatus {
    word: AtomicU64,
    last_loan_ns: AtomicU64,
}

impl LoanStatus {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn holders(&self) -> u64 {
        holders_of(self.word.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_loaned(&self) -> bool {
        self.holders() > 0
    }

    /// Strictest reservation currently held
    #[inline]
    pub fn reservation(&self) -> Reservation {
        outstanding_of(self.word.load(Ordering::Acquire))
    }

    /// Whether an exclusive immutable loan is outstanding
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Acquire) & LOCKED_BIT != 0
    }

    /// Whether `requested` could be granted right now
    pub fn is_acceptable_reservation(&self, requested: Reservation) -> bool {
        let word = self.word.load(Ordering::Acquire);
        holders_of(word) == 0 || requested.is_compatible_with(outstanding_of(word))
    }

    /// Grant a loan if compatible; returns the new holder count
    pub fn try_acquire(&self, policy: &LoanPolicy, now_ns: u64) -> Result<u64, Reservation> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let holders = holders_of(current);
            if holders > 0 && !policy.reservation.is_compatible_with(outstanding_of(current)) {
                return Err(outstanding_of(current));
            }

            let mut next = (current & !HOLDERS_MASK) | (holders + 1);
            if policy.reservation == Reservation::ExclusiveWrite {
                next |= EXCLUSIVE_BIT;
                if policy.immutable {
                    next |= LOCKED_BIT;
                }
            }

            match self.word.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.last_loan_ns.store(now_ns, Ordering::Relaxed);
                    return Ok(holders + 1);
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Return one loan
    pub fn release(&self) -> Release {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let holders = holders_of(current);
            if holders == 0 {
                return Release::NotLoaned;
            }
            let remaining = holders - 1;
            // An exclusive loan is always the sole holder
            let next = if remaining == 0 { 0 } else { (current & !HOLDERS_MASK) | remaining };

            match self.word.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if remaining == 0 => return Release::Unrestricted,
                Ok(_) => return Release::StillLoaned(remaining),
                Err(observed) => current = observed,
            }
        }
    }

    pub fn snapshot(&self) -> LoanSnapshot {
        let word = self.word.load(Ordering::Acquire);
        LoanSnapshot {
            holders: holders_of(word),
            reservation: outstanding_of(word),
            locked: word & LOCKED_BIT != 0,
            last_loan_ns: self.last_loan_ns.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of a loan status for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoanSnapshot {
    pub holders: u64,
    pub reservation: Reservation,
    pub locked: bool,
    pub last_loan_ns: u64,
}

/// A value on loan from a data cache
///
/// Hand it back with `DataCache::return_loan`. An `ExclusiveWrite` loan may
/// change the value through `set`; the change is written back on return.
#[derive(Debug)]
#[must_use = "a loan restricts its object until returned"]
pub struct Loaned<K, V> {
    handle: CacheHandle,
    key: K,
    value: V,
    policy: LoanPolicy,
    generation: u64,
    loaned_at_ns: u64,
    dirty: bool,
}

impl<K, V> Loaned<K, V> {
    pub(crate) fn new(
        handle: CacheHandle,
        key: K,
        value: V,
        policy: LoanPolicy,
        generation: u64,
        loaned_at_ns: u64,
    ) -> Self {
        Self {
            handle,
            key,
            value,
            policy,
            generation,
            loaned_at_ns,
            dirty: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> &CacheHandle {
        &self.handle
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    #[inline]
    pub fn loaned_at_ns(&self) -> u64 {
        self.loaned_at_ns
    }

    /// Replace the loaned value; only exclusive write loans may do this
    pub fn set(&mut self, value: V) -> bool {
        if self.policy.reservation != Reservation::ExclusiveWrite {
            return false;
        }
        self.value = value;
        self.dirty = true;
        true
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn into_parts(self) -> (K, V, LoanPolicy, u64, bool) {
        (self.key, self.value, self.policy, self.generation, self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_loans_coexist() {
        let status = LoanStatus::new();
        assert_eq!(status.try_acquire(&LoanPolicy::shared_read(), 1), Ok(1));
        assert_eq!(status.try_acquire(&LoanPolicy::shared_read(), 2), Ok(2));
        assert_eq!(status.reservation(), Reservation::SharedRead);
        assert!(!status.is_acceptable_reservation(Reservation::ExclusiveWrite));
        assert_eq!(
            status.try_acquire(&LoanPolicy::exclusive_write(), 3),
            Err(Reservation::SharedRead)
        );
        assert_eq!(status.release(), Release::StillLoaned(1));
        assert_eq!(status.release(), Release::Unrestricted);
        assert_eq!(status.release(), Release::NotLoaned);
    }

    #[test]
    fn test_exclusive_conflicts_with_everything() {
        let status = LoanStatus::new();
        let policy = LoanPolicy::exclusive_write().immutable();
        assert_eq!(status.try_acquire(&policy, 1), Ok(1));
        assert!(status.is_locked());
        for requested in [Reservation::None, Reservation::SharedRead, Reservation::ExclusiveWrite] {
            assert_eq!(
                status.try_acquire(&LoanPolicy::new(requested), 2),
                Err(Reservation::ExclusiveWrite)
            );
        }
        assert_eq!(status.release(), Release::Unrestricted);
        assert!(!status.is_locked());
        assert_eq!(status.reservation(), Reservation::None);
        assert_eq!(status.try_acquire(&LoanPolicy::exclusive_write(), 4), Ok(1));
        assert!(!status.is_locked());
        assert_eq!(status.snapshot().last_loan_ns, 4);
    }

    #[test]
    fn test_concurrent_exclusive_single_winner() {
        let status = LoanStatus::new();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let status = &status;
                    scope.spawn(move || {
                        status
                            .try_acquire(&LoanPolicy::exclusive_write(), i)
                            .is_ok() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap_or(0)).sum()
        });
        assert_eq!(winners, 1);
        assert_eq!(status.holders(), 1);
    }

    #[test]
    fn test_loaned_set_requires_exclusive() {
        let handle = CacheHandle::new(crate::cache::types::DataCacheId::new(
            "m".into(),
            "t".into(),
        ));
        let mut shared = Loaned::new(handle.clone(), 1u32, 10u32, LoanPolicy::shared_read(), 1, 0);
        assert!(!shared.set(11));
        assert_eq!(*shared.value(), 10);

        let mut exclusive = Loaned::new(handle, 1u32, 10u32, LoanPolicy::exclusive_write(), 1, 0);
        assert!(exclusive.set(11));
        let (_, value, _, _, dirty) = exclusive.into_parts();
        assert_eq!(value, 11);
        assert!(dirty);
    }
}
