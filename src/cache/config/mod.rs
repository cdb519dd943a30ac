//! Cache configuration: policies, lifetimes, limits and loan terms

pub mod builder;
pub mod loan;
pub mod types;

pub use builder::CachePolicyBuilder;
pub use loan::{LoanPolicy, LoanReturnPolicy, Reservation};
pub use types::{
    CacheMasterPolicy, CachePolicy, CleanupAlgorithmType, DataCachePolicy, Lifetime,
    MementoPolicy, ResourceLimits, SweepConfig,
};
