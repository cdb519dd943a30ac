//! Periodic sweep over a factory
//!
//! Each data cache and each master is swept in isolation: a panic in one unit
//! is caught, logged and counted, and the sweep moves on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::CacheFactory;
use crate::cache::config::SweepConfig;
use crate::cache::master::CacheMaster;
use crate::cache::policy::PolicyChecker;
use crate::cache::types::timestamp_nanos;

/// Totals of one sweep over a factory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub caches_cleaned: usize,
    pub objects_expired: usize,
    pub objects_evicted: usize,
    pub masters_removed: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn absorb(&mut self, other: SweepReport) {
        self.caches_cleaned += other.caches_cleaned;
        self.objects_expired += other.objects_expired;
        self.objects_evicted += other.objects_evicted;
        self.masters_removed += other.masters_removed;
        self.failures += other.failures;
    }
}

impl CacheFactory {
    /// Remove `master` if it outlived its lifetime, or is empty and idle
    /// for longer than `inactivity_timeout`
    pub fn cleanup_cache_master(
        &self,
        master: &Arc<CacheMaster>,
        inactivity_timeout: Duration,
    ) -> bool {
        self.expire_if_master(master, |master| {
            PolicyChecker::is_master_removable(
                master.is_lifetime_exceeded(),
                master.is_empty(),
                master.idle_for(timestamp_nanos()),
                inactivity_timeout,
            )
        })
    }

    /// Clean every data cache, then remove masters that are due
    pub fn sweep(&self, config: &SweepConfig) -> SweepReport {
        let mut report = SweepReport::default();
        for master in self.masters() {
            for cache in master.caches() {
                match catch_unwind(AssertUnwindSafe(|| cache.cleanup())) {
                    Ok(cleaned) => {
                        report.caches_cleaned += 1;
                        report.objects_expired += cleaned.expired;
                        report.objects_evicted += cleaned.evicted;
                    }
                    Err(_) => {
                        report.failures += 1;
                        log::warn!("Cleanup of data cache {} panicked; skipped", cache.id());
                    }
                }
            }

            let removed = catch_unwind(AssertUnwindSafe(|| {
                master.prune_expired_caches();
                self.cleanup_cache_master(&master, config.inactivity_timeout)
            }));
            match removed {
                Ok(true) => report.masters_removed += 1,
                Ok(false) => {}
                Err(_) => {
                    report.failures += 1;
                    log::warn!("Cleanup of cache master {} panicked; skipped", master.id());
                }
            }
        }
        if report.objects_evicted + report.objects_expired + report.masters_removed > 0 {
            log::debug!("Sweep of {} finished: {:?}", self.domain, report);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::{CacheMasterPolicy, CachePolicy};
    use crate::cache::observer::CacheObserver;
    use crate::cache::types::{DataCacheId, MasterCacheId};

    fn config(inactivity_timeout: Duration) -> SweepConfig {
        SweepConfig {
            enabled: true,
            interval: Duration::from_millis(10),
            inactivity_timeout,
        }
    }

    #[test]
    fn test_sweep_enforces_soft_bounds() {
        let factory = CacheFactory::new("d".into());
        let policy = CachePolicy::builder().max_samples(2).build();
        if let Ok(cache) = factory.data_cache::<u32, u32>(&"m".into(), "n".into(), &policy) {
            for i in 0..5 {
                cache.write(i, i).ok();
            }
        }
        let report = factory.sweep(&config(Duration::from_secs(60)));
        assert_eq!(report.caches_cleaned, 1);
        assert_eq!(report.objects_evicted, 3);
        assert_eq!(report.masters_removed, 0);
        assert_eq!(factory.status().total_objects(), 2);
    }

    #[test]
    fn test_idle_empty_master_removed() {
        let factory = CacheFactory::new("d".into());
        let id: MasterCacheId = "idle".into();
        let busy: MasterCacheId = "busy".into();
        factory.compute_master_if_absent(&id, &CacheMasterPolicy::default());
        if let Ok(cache) = factory.data_cache::<u32, u32>(&busy, "n".into(), &CachePolicy::default()) {
            cache.write(1, 1).ok();
        }
        std::thread::sleep(Duration::from_millis(20));

        let report = factory.sweep(&config(Duration::from_millis(5)));
        assert_eq!(report.masters_removed, 1);
        assert!(factory.find_cache(&id).is_none());
        assert!(factory.find_cache(&busy).is_some());
    }

    #[test]
    fn test_active_master_kept() {
        let factory = CacheFactory::new("d".into());
        let master = factory.compute_master_if_absent(&"m".into(), &CacheMasterPolicy::default());
        assert!(!factory.cleanup_cache_master(&master, Duration::from_secs(60)));
        assert!(factory.find_cache(master.id()).is_some());
    }

    #[test]
    fn test_panicking_unit_is_isolated() {
        struct Exploding;
        impl CacheObserver for Exploding {
            fn on_modified_cache(&self, cache: &DataCacheId) {
                if cache.master().as_str() == "bad" {
                    panic!("observer failure");
                }
            }
        }

        let factory = CacheFactory::new("d".into());
        let policy = CachePolicy::builder().max_samples(1).build();
        for master in ["bad", "good"] {
            if let Ok(cache) = factory.data_cache::<u32, u32>(&master.into(), "n".into(), &policy) {
                cache.write(1, 1).ok();
                cache.write(2, 2).ok();
            }
        }
        factory.add_cache_observer(Arc::new(Exploding));

        let report = factory.sweep(&config(Duration::from_secs(60)));
        assert_eq!(report.failures, 1);
        assert_eq!(report.caches_cleaned, 1);
        assert_eq!(report.objects_evicted, 1);
    }
}
