//! Policy value objects consumed by every cache component
//!
//! All types are immutable once built, serializable with serde and carry
//! defaults suitable for an unbounded, never-expiring cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::traits::{CacheOperationError, CacheResult};
use crate::cache::types::elapsed_since;

/// Serialize `Duration` as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Bound on the number of objects a data cache may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of object roots
    pub max_samples: usize,
    /// Hard limits reject writes up front; soft limits rely on eviction
    pub hard: bool,
}

impl ResourceLimits {
    /// No bound at all
    pub const fn unlimited() -> Self {
        Self {
            max_samples: usize::MAX,
            hard: false,
        }
    }

    /// Bound enforced after the fact by eviction
    pub const fn soft(max_samples: usize) -> Self {
        Self {
            max_samples,
            hard: false,
        }
    }

    /// Bound enforced before insertion
    pub const fn hard(max_samples: usize) -> Self {
        Self {
            max_samples,
            hard: true,
        }
    }

    #[inline]
    pub fn is_hard(&self) -> bool {
        self.hard
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.max_samples == usize::MAX
    }

    /// Number of objects above the bound
    #[inline]
    pub fn overflow(&self, size: usize) -> usize {
        size.saturating_sub(self.max_samples)
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Maximum duration a container or object stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    #[default]
    Forever,
    /// Valid for this many milliseconds after creation
    Millis(u64),
}

impl Lifetime {
    /// Lifetime of `duration`, truncated to whole milliseconds
    ///
    /// # Panics
    ///
    /// Panics when `duration` is shorter than one millisecond; use
    /// `try_from_duration` to get an error instead.
    pub fn from_duration(duration: Duration) -> Self {
        match Self::try_from_duration(duration) {
            Ok(lifetime) => lifetime,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_from_duration(duration: Duration) -> CacheResult<Self> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Err(CacheOperationError::invalid_argument(format!(
                "lifetime of {:?} is shorter than one millisecond",
                duration
            )));
        }
        Ok(Self::Millis(millis))
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Lifetime::Forever => None,
            Lifetime::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }

    #[inline]
    pub fn is_forever(&self) -> bool {
        matches!(self, Lifetime::Forever)
    }

    /// Whether something created at `created_ns` has outlived this lifetime
    pub fn is_exceeded(&self, created_ns: u64, now_ns: u64) -> bool {
        match self.duration() {
            None => false,
            Some(limit) => elapsed_since(created_ns, now_ns) > limit,
        }
    }
}

/// Eviction strategy used when a data cache overflows its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupAlgorithmType {
    /// Least recently read first
    #[default]
    Lru,
    /// Lowest read count first
    Lfu,
}

/// Bound on per-key undo/redo history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MementoPolicy {
    /// Maximum entries on each of the undo and redo stacks; zero disables history
    pub max_depth: usize,
}

impl MementoPolicy {
    pub const fn disabled() -> Self {
        Self { max_depth: 0 }
    }

    pub const fn with_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.max_depth > 0
    }
}

/// Policy for one data cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataCachePolicy {
    pub resource_limits: ResourceLimits,
    /// Lifetime of the data cache itself
    pub lifetime: Lifetime,
    /// Lifetime of every object, measured from its creation
    pub object_lifetime: Lifetime,
    pub cleanup_algorithm: CleanupAlgorithmType,
    pub memento: MementoPolicy,
}

/// Policy for one cache master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheMasterPolicy {
    pub lifetime: Lifetime,
}

/// Complete policy: master plus data cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CachePolicy {
    pub master: CacheMasterPolicy,
    pub data: DataCachePolicy,
}

impl CachePolicy {
    pub fn builder() -> super::builder::CachePolicyBuilder {
        super::builder::CachePolicyBuilder::new()
    }
}

/// Background sweep configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Whether a sweep worker thread is started
    pub enabled: bool,
    /// Pause between sweeps
    #[serde(with = "duration_ms", rename = "interval_ms")]
    pub interval: Duration,
    /// Empty masters idle for longer than this are removed
    #[serde(with = "duration_ms", rename = "inactivity_timeout_ms")]
    pub inactivity_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}
