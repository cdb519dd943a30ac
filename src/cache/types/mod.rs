//! Shared value types: identifiers and timestamps

pub mod atomic;
pub mod ids;

pub use atomic::{elapsed_since, timestamp_nanos};
pub use ids::{CacheHandle, DataCacheId, DomainCacheId, MasterCacheId, Typename};
