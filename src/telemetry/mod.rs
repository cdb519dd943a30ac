//! Telemetry: operation counters and pull-style status snapshots
//!
//! Nothing here pushes data anywhere; collectors poll `status()` on a data
//! cache, master or factory and serialize the result.

pub mod snapshot;
pub mod stats;

pub use snapshot::{AccessStatusSnapshot, CacheMasterStatus, DataCacheStatus, FactoryStatus};
pub use stats::{CacheStatistics, CacheStatisticsSnapshot};
