//! Stashbox prelude - convenient imports for users

pub use crate::stashbox::{Stashbox, StashboxBuilder};

// Error types
pub use crate::cache::traits::{CacheOperationError, CacheResult, ErrorCategory, RecoveryHint};

// Traits for user keys, values and observers
pub use crate::cache::observer::{
    CacheMasterObserver, CacheObserver, MementoObserver, ObjectObserver, ObserverHandle,
};
pub use crate::cache::traits::{CacheKey, CacheValue, ManagedCache};

// Policies
pub use crate::cache::config::{
    CacheMasterPolicy, CachePolicy, CachePolicyBuilder, CleanupAlgorithmType, DataCachePolicy,
    Lifetime, LoanPolicy, LoanReturnPolicy, MementoPolicy, Reservation, ResourceLimits,
    SweepConfig,
};

// Containers and identifiers
pub use crate::cache::access::{AccessStatus, ObjectState};
pub use crate::cache::data::DataCache;
pub use crate::cache::factory::{CacheFactory, DomainRegistry, SweepReport};
pub use crate::cache::master::CacheMaster;
pub use crate::cache::object::Loaned;
pub use crate::cache::types::{CacheHandle, DataCacheId, DomainCacheId, MasterCacheId, Typename};
pub use crate::cache::worker::{SweepTarget, SweepWorker};
