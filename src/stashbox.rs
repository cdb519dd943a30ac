//! Simple public API for the stashbox cache
//!
//! `Stashbox` bundles a cache factory with an optional background sweep
//! worker. Everything else in the crate stays reachable through
//! `Stashbox::factory` for callers that need the full engine.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::config::{CachePolicy, SweepConfig};
use crate::cache::data::DataCache;
use crate::cache::factory::{CacheFactory, DomainRegistry, SweepReport};
use crate::cache::master::CacheMaster;
use crate::cache::traits::{CacheKey, CacheResult, CacheValue};
use crate::cache::types::{DomainCacheId, MasterCacheId, Typename};
use crate::cache::worker::{SweepStatsSnapshot, SweepTarget, SweepWorker};
use crate::telemetry::snapshot::FactoryStatus;

const DEFAULT_DOMAIN: &str = "stashbox";

/// Cache factory plus background sweep, configured once
pub struct Stashbox {
    factory: Arc<CacheFactory>,
    policy: CachePolicy,
    sweep: SweepConfig,
    worker: Option<SweepWorker>,
}

impl std::fmt::Debug for Stashbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stashbox")
            .field("domain", self.factory.domain())
            .field("masters", &self.factory.len())
            .field("sweeping", &self.worker.is_some())
            .finish()
    }
}

impl Stashbox {
    /// Create new builder with fluent configuration
    pub fn builder() -> StashboxBuilder {
        StashboxBuilder::new()
    }

    /// Create with default configuration
    pub fn new() -> CacheResult<Self> {
        Self::builder().build()
    }

    #[inline]
    pub fn factory(&self) -> &Arc<CacheFactory> {
        &self.factory
    }

    #[inline]
    pub fn default_policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Get or create a master under the default policy
    pub fn master(&self, id: impl Into<MasterCacheId>) -> Arc<CacheMaster> {
        self.factory
            .compute_master_if_absent(&id.into(), &self.policy.master)
    }

    /// Get or create a data cache under the default policy
    pub fn data_cache<K: CacheKey, V: CacheValue>(
        &self,
        master: impl Into<MasterCacheId>,
        typename: impl Into<Typename>,
    ) -> CacheResult<Arc<DataCache<K, V>>> {
        self.data_cache_with(master, typename, &self.policy)
    }

    /// Get or create a data cache under an explicit policy
    pub fn data_cache_with<K: CacheKey, V: CacheValue>(
        &self,
        master: impl Into<MasterCacheId>,
        typename: impl Into<Typename>,
        policy: &CachePolicy,
    ) -> CacheResult<Arc<DataCache<K, V>>> {
        self.factory
            .data_cache(&master.into(), typename.into(), policy)
    }

    /// Data cache named after the value type
    pub fn typed_cache<K: CacheKey, V: CacheValue>(
        &self,
        master: impl Into<MasterCacheId>,
    ) -> CacheResult<Arc<DataCache<K, V>>> {
        self.data_cache(master, Typename::of::<V>())
    }

    /// Sweep on the calling thread, independent of the worker
    pub fn sweep_now(&self) -> SweepReport {
        match &self.worker {
            Some(worker) => worker.sweep_once(),
            None => self.factory.sweep(&self.sweep),
        }
    }

    /// Background sweep statistics, when a worker runs
    pub fn sweep_stats(&self) -> Option<SweepStatsSnapshot> {
        self.worker.as_ref().map(SweepWorker::stats)
    }

    pub fn status(&self) -> FactoryStatus {
        self.factory.status()
    }

    /// Stop the background worker, if any
    pub fn shutdown(&mut self) -> CacheResult<()> {
        match self.worker.take() {
            Some(mut worker) => worker.stop(),
            None => Ok(()),
        }
    }
}

/// Fluent builder for `Stashbox`
#[derive(Debug, Clone)]
pub struct StashboxBuilder {
    domain: String,
    policy: CachePolicy,
    sweep: SweepConfig,
    register_globally: bool,
}

impl Default for StashboxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StashboxBuilder {
    pub fn new() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            policy: CachePolicy::default(),
            sweep: SweepConfig::default(),
            register_globally: false,
        }
    }

    /// Domain id of the factory
    pub fn domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = domain.into();
        self
    }

    /// Policy used by `Stashbox::data_cache` and `Stashbox::master`
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sweep_config(mut self, sweep: SweepConfig) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep.interval = interval;
        self
    }

    /// Empty masters idle for longer than this are swept away
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.sweep.inactivity_timeout = timeout;
        self
    }

    /// Do not start a background sweep thread
    pub fn without_sweep(mut self) -> Self {
        self.sweep.enabled = false;
        self
    }

    /// Share the factory through `DomainRegistry::global()`
    pub fn register_globally(mut self) -> Self {
        self.register_globally = true;
        self
    }

    /// Build the facade, starting the sweep worker when enabled
    pub fn build(self) -> CacheResult<Stashbox> {
        let domain = DomainCacheId::try_new(&self.domain)?;
        if self.sweep.enabled && self.sweep.interval.is_zero() {
            return Err(crate::cache::traits::CacheOperationError::invalid_argument(
                "sweep interval must be greater than zero",
            ));
        }

        let factory = if self.register_globally {
            DomainRegistry::global().factory(&domain)
        } else {
            Arc::new(CacheFactory::new(domain))
        };

        let worker = if self.sweep.enabled {
            let mut worker = SweepWorker::new(SweepTarget::Factory(Arc::clone(&factory)), self.sweep);
            worker.start()?;
            Some(worker)
        } else {
            None
        };

        Ok(Stashbox {
            factory,
            policy: self.policy,
            sweep: self.sweep,
            worker,
        })
    }
}
