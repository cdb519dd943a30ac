//! Fluent construction of `CachePolicy`

use std::time::Duration;

use super::types::{
    CacheMasterPolicy, CachePolicy, CleanupAlgorithmType, DataCachePolicy, Lifetime,
    MementoPolicy, ResourceLimits,
};

/// Builder for `CachePolicy`
#[derive(Debug, Clone, Default)]
pub struct CachePolicyBuilder {
    master: CacheMasterPolicy,
    data: DataCachePolicy,
}

impl CachePolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime of the cache master
    pub fn master_lifetime(mut self, lifetime: Duration) -> Self {
        self.master.lifetime = Lifetime::from_duration(lifetime);
        self
    }

    /// Lifetime of each data cache
    pub fn data_cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.data.lifetime = Lifetime::from_duration(lifetime);
        self
    }

    /// Lifetime of each object, measured from creation
    pub fn object_lifetime(mut self, lifetime: Duration) -> Self {
        self.data.object_lifetime = Lifetime::from_duration(lifetime);
        self
    }

    /// Soft bound restored by eviction
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.data.resource_limits = ResourceLimits::soft(max_samples);
        self
    }

    /// Hard bound that rejects writes
    pub fn hard_max_samples(mut self, max_samples: usize) -> Self {
        self.data.resource_limits = ResourceLimits::hard(max_samples);
        self
    }

    pub fn cleanup_algorithm(mut self, algorithm: CleanupAlgorithmType) -> Self {
        self.data.cleanup_algorithm = algorithm;
        self
    }

    /// Keep up to `depth` undo and redo entries per key
    pub fn memento_depth(mut self, depth: usize) -> Self {
        self.data.memento = MementoPolicy::with_depth(depth);
        self
    }

    pub fn build(self) -> CachePolicy {
        CachePolicy {
            master: self.master,
            data: self.data,
        }
    }
}
