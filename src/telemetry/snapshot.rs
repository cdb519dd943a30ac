//! Pull-style status snapshots
//!
//! Snapshots are plain copies taken without side effects on access tracking.
//! They serialize with serde so external collectors can ship them as JSON.

use serde::Serialize;

use crate::cache::access::AccessStatus;
use crate::cache::config::CleanupAlgorithmType;
use crate::cache::object::LoanSnapshot;

use super::stats::CacheStatisticsSnapshot;

/// Status of one key: access bookkeeping plus loan state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessStatusSnapshot {
    pub key: String,
    pub generation: u64,
    pub access: AccessStatus,
    pub loan: LoanSnapshot,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

/// Status of one data cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataCacheStatus {
    pub id: String,
    pub master: String,
    pub typename: String,
    /// Object roots held, including retired ones awaiting sweep
    pub size: usize,
    /// Object roots still readable
    pub live: usize,
    /// Object roots with at least one outstanding loan
    pub loaned: usize,
    pub expired: bool,
    pub max_samples: usize,
    pub hard_limit: bool,
    pub cleanup_algorithm: CleanupAlgorithmType,
    pub created_ns: u64,
    pub last_modified_ns: u64,
    pub statistics: CacheStatisticsSnapshot,
}

/// Status of one cache master and its data caches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMasterStatus {
    pub id: String,
    pub expired: bool,
    pub created_ns: u64,
    pub last_modified_ns: u64,
    pub data_caches: Vec<DataCacheStatus>,
}

impl CacheMasterStatus {
    pub fn total_objects(&self) -> usize {
        self.data_caches.iter().map(|c| c.size).sum()
    }
}

/// Status of a whole factory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactoryStatus {
    pub domain: String,
    pub masters: Vec<CacheMasterStatus>,
}

impl FactoryStatus {
    pub fn total_objects(&self) -> usize {
        self.masters.iter().map(CacheMasterStatus::total_objects).sum()
    }
}

macro_rules! impl_to_json {
    ($($name:ident),+ $(,)?) => {
        $(
            impl $name {
                /// Serialize as compact JSON
                pub fn to_json(&self) -> serde_json::Result<String> {
                    serde_json::to_string(self)
                }
            }
        )+
    };
}

impl_to_json!(AccessStatusSnapshot, DataCacheStatus, CacheMasterStatus, FactoryStatus);

#[cfg(test)]
mod tests {
    use super::*;

    fn data_status(size: usize) -> DataCacheStatus {
        DataCacheStatus {
            id: "m/t".into(),
            master: "m".into(),
            typename: "t".into(),
            size,
            live: size,
            loaned: 0,
            expired: false,
            max_samples: usize::MAX,
            hard_limit: false,
            cleanup_algorithm: CleanupAlgorithmType::Lfu,
            created_ns: 1,
            last_modified_ns: 2,
            statistics: CacheStatisticsSnapshot::default(),
        }
    }

    #[test]
    fn test_totals() {
        let master = CacheMasterStatus {
            id: "m".into(),
            expired: false,
            created_ns: 1,
            last_modified_ns: 2,
            data_caches: vec![data_status(2), data_status(3)],
        };
        let factory = FactoryStatus {
            domain: "d".into(),
            masters: vec![master.clone(), master],
        };
        assert_eq!(factory.total_objects(), 10);
    }

    #[test]
    fn test_json_shape() {
        let json = data_status(4).to_json().unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(parsed["size"], 4);
        assert_eq!(parsed["cleanup_algorithm"], "lfu");
        assert_eq!(parsed["statistics"]["hits"], 0);
    }
}
