//! Pure permission checks for writes, removals, loans and lifetimes

use std::time::Duration;

use crate::cache::config::{Lifetime, LoanPolicy, ResourceLimits};
use crate::cache::object::loan::LoanStatus;
use crate::cache::traits::{CacheOperationError, CacheResult};
use crate::cache::types::DataCacheId;

/// Stateless policy evaluation
pub struct PolicyChecker;

impl PolicyChecker {
    /// Reject adding `additional` objects when a hard limit would be exceeded
    pub fn assert_writing_possible(
        cache: &DataCacheId,
        current: usize,
        additional: usize,
        limits: &ResourceLimits,
    ) -> CacheResult<()> {
        if limits.is_hard() && current.saturating_add(additional) > limits.max_samples {
            log::warn!(
                "Rejected write of {} object(s) into {}: {} present, hard limit {}",
                additional,
                cache,
                current,
                limits.max_samples
            );
            return Err(CacheOperationError::CapacityExceeded {
                cache: cache.to_string(),
                current,
                requested: additional,
                max: limits.max_samples,
            });
        }
        Ok(())
    }

    /// Overwriting is blocked only by an exclusive immutable loan
    pub fn assert_overwrite_possible(loans: &LoanStatus) -> CacheResult<()> {
        if loans.is_locked() {
            return Err(CacheOperationError::loan_conflict(
                "value is under an exclusive immutable loan and cannot be overwritten",
            ));
        }
        Ok(())
    }

    /// Removal is blocked only by an exclusive immutable loan
    pub fn assert_removal_possible(loans: &LoanStatus) -> CacheResult<()> {
        if loans.is_locked() {
            return Err(CacheOperationError::loan_conflict(
                "value is under an exclusive immutable loan and cannot be removed",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn is_removal_possible(loans: &LoanStatus) -> bool {
        !loans.is_locked()
    }

    /// Reject a loan that conflicts with the outstanding reservation
    pub fn assert_loan_possible(loans: &LoanStatus, policy: &LoanPolicy) -> CacheResult<()> {
        if !loans.is_acceptable_reservation(policy.reservation) {
            return Err(CacheOperationError::loan_conflict(format!(
                "{:?} requested while {:?} is held",
                policy.reservation,
                loans.reservation()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_lifetime_exceeded(lifetime: &Lifetime, created_ns: u64, now_ns: u64) -> bool {
        lifetime.is_exceeded(created_ns, now_ns)
    }

    /// Master removal rule: past its lifetime, or empty and idle too long
    pub fn is_master_removable(
        lifetime_exceeded: bool,
        is_empty: bool,
        idle: Duration,
        inactivity_timeout: Duration,
    ) -> bool {
        lifetime_exceeded || (is_empty && idle > inactivity_timeout)
    }
}
