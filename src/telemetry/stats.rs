//! Lock-free per-cache operation counters
//!
//! Each counter sits on its own cache line so hot readers and writers on
//! different counters do not contend.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::Serialize;

/// Operation counters for one data cache
#[derive(Debug, Default)]
pub struct CacheStatistics {
    hits: CachePadded<AtomicU64>,
    misses: CachePadded<AtomicU64>,
    writes: CachePadded<AtomicU64>,
    rejected_writes: CachePadded<AtomicU64>,
    removals: CachePadded<AtomicU64>,
    evictions: CachePadded<AtomicU64>,
    expirations: CachePadded<AtomicU64>,
    loans_granted: CachePadded<AtomicU64>,
    loans_rejected: CachePadded<AtomicU64>,
    loans_returned: CachePadded<AtomicU64>,
    history_steps: CachePadded<AtomicU64>,
}

/// Plain copy of `CacheStatistics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatisticsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub rejected_writes: u64,
    pub removals: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub loans_granted: u64,
    pub loans_rejected: u64,
    pub loans_returned: u64,
    pub history_steps: u64,
}

impl CacheStatisticsSnapshot {
    /// Fraction of reads that found a live value
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_removals(&self, count: usize) {
        self.removals.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_loan(&self, granted: bool) {
        if granted {
            self.loans_granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.loans_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn record_loan_returned(&self) {
        self.loans_returned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_history_step(&self) {
        self.history_steps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatisticsSnapshot {
        CacheStatisticsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            loans_granted: self.loans_granted.load(Ordering::Relaxed),
            loans_rejected: self.loans_rejected.load(Ordering::Relaxed),
            loans_returned: self.loans_returned.load(Ordering::Relaxed),
            history_steps: self.history_steps.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStatistics::new();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStatisticsSnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_loan_counters() {
        let stats = CacheStatistics::new();
        stats.record_loan(true);
        stats.record_loan(false);
        stats.record_loan_returned();
        let snapshot = stats.snapshot();
        assert_eq!(
            (snapshot.loans_granted, snapshot.loans_rejected, snapshot.loans_returned),
            (1, 1, 1)
        );
    }
}
