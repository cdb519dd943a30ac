//! Cache traits and the error vocabulary shared by every component

pub mod core;
pub mod types_and_enums;

pub use self::core::{CacheKey, CacheValue, CleanupReport, ManagedCache};
pub use types_and_enums::{CacheOperationError, CacheResult, ErrorCategory, RecoveryHint};
