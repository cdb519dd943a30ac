//! Commands, targets and statistics of the sweep worker

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use serde::Serialize;

use crate::cache::factory::{CacheFactory, DomainRegistry, SweepReport};

/// Messages sent to the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepCommand {
    /// Sweep immediately instead of waiting for the interval
    RunNow,
    /// Leave the worker loop
    Shutdown,
}

/// What a sweep worker walks over
#[derive(Debug, Clone)]
pub enum SweepTarget {
    /// A single factory
    Factory(Arc<CacheFactory>),
    /// Every factory of a registry
    Registry(Arc<DomainRegistry>),
    /// Every factory of `DomainRegistry::global()`
    Global,
}

impl SweepTarget {
    pub fn factories(&self) -> Vec<Arc<CacheFactory>> {
        match self {
            SweepTarget::Factory(factory) => vec![Arc::clone(factory)],
            SweepTarget::Registry(registry) => registry.factories(),
            SweepTarget::Global => DomainRegistry::global().factories(),
        }
    }
}

/// Cumulative sweep statistics, updated by the worker thread
#[derive(Debug, Default)]
pub struct SweepStats {
    runs: CachePadded<AtomicU64>,
    caches_cleaned: CachePadded<AtomicU64>,
    objects_expired: CachePadded<AtomicU64>,
    objects_evicted: CachePadded<AtomicU64>,
    masters_removed: CachePadded<AtomicU64>,
    failures: CachePadded<AtomicU64>,
    last_run_ns: CachePadded<AtomicU64>,
}

/// Plain copy of `SweepStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStatsSnapshot {
    pub runs: u64,
    pub caches_cleaned: u64,
    pub objects_expired: u64,
    pub objects_evicted: u64,
    pub masters_removed: u64,
    pub failures: u64,
    pub last_run_ns: u64,
}

impl SweepStats {
    pub fn record(&self, report: &SweepReport, now_ns: u64) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.caches_cleaned
            .fetch_add(report.caches_cleaned as u64, Ordering::Relaxed);
        self.objects_expired
            .fetch_add(report.objects_expired as u64, Ordering::Relaxed);
        self.objects_evicted
            .fetch_add(report.objects_evicted as u64, Ordering::Relaxed);
        self.masters_removed
            .fetch_add(report.masters_removed as u64, Ordering::Relaxed);
        self.failures.fetch_add(report.failures as u64, Ordering::Relaxed);
        self.last_run_ns.fetch_max(now_ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SweepStatsSnapshot {
        SweepStatsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            caches_cleaned: self.caches_cleaned.load(Ordering::Relaxed),
            objects_expired: self.objects_expired.load(Ordering::Relaxed),
            objects_evicted: self.objects_evicted.load(Ordering::Relaxed),
            masters_removed: self.masters_removed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_run_ns: self.last_run_ns.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let stats = SweepStats::default();
        let report = SweepReport {
            caches_cleaned: 2,
            objects_evicted: 3,
            failures: 1,
            ..SweepReport::default()
        };
        stats.record(&report, 10);
        stats.record(&report, 5);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.runs, 2);
        assert_eq!(snapshot.objects_evicted, 6);
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.last_run_ns, 10);
    }

    #[test]
    fn test_registry_target_lists_factories() {
        let registry = Arc::new(DomainRegistry::new());
        registry.factory(&"a".into());
        registry.factory(&"b".into());
        assert_eq!(SweepTarget::Registry(registry).factories().len(), 2);
    }
}
