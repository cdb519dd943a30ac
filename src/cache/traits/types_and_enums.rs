//! Error taxonomy and recovery hints for cache operations
//!
//! Capacity and loan conflicts are rejected synchronously; absence is never an
//! error and is reported as `None` by the operations themselves.

/// Broad classification of a cache error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource bound violated
    Resource,
    /// Concurrent loan/reservation conflict
    Concurrency,
    /// Container no longer valid
    Lifecycle,
    /// Caller passed something unusable
    Configuration,
    /// Background machinery unavailable
    Infrastructure,
}

/// Recovery hint for cache operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Run a cleanup pass (or wait for the sweep) and retry
    CleanupAndRetry,
    /// Retry after the conflicting loan is returned
    RetryLater,
    /// Look the container up again; it was replaced
    Reacquire,
    /// Fix the call site
    Fatal,
}

/// Cache operation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOperationError {
    /// A write would exceed a hard `ResourceLimits` bound
    CapacityExceeded {
        cache: String,
        current: usize,
        requested: usize,
        max: usize,
    },
    /// Requested reservation conflicts with an outstanding loan, or the value
    /// is protected by an exclusive immutable loan
    LoanConflict(String),
    /// The target container has expired and accepts no new work
    CacheExpired(String),
    /// A data cache exists under this id with different key/value types
    TypeMismatch(String),
    /// Caller supplied an unusable argument
    InvalidArgument(String),
    /// Background machinery failed to start
    InitializationFailed(String),
    /// Background worker is not running
    WorkerUnavailable,
}

/// Result alias used throughout the crate
pub type CacheResult<T> = Result<T, CacheOperationError>;

impl std::fmt::Display for CacheOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheOperationError::CapacityExceeded {
                cache,
                current,
                requested,
                max,
            } => write!(
                f,
                "Capacity exceeded in {}: {} present + {} requested > {} allowed",
                cache, current, requested, max
            ),
            CacheOperationError::LoanConflict(msg) => write!(f, "Loan conflict: {}", msg),
            CacheOperationError::CacheExpired(msg) => write!(f, "Cache expired: {}", msg),
            CacheOperationError::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            CacheOperationError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CacheOperationError::InitializationFailed(msg) => {
                write!(f, "Initialization failed: {}", msg)
            }
            CacheOperationError::WorkerUnavailable => write!(f, "Sweep worker unavailable"),
        }
    }
}

impl std::error::Error for CacheOperationError {}

impl CacheOperationError {
    /// Create loan conflict error
    #[inline(always)]
    pub fn loan_conflict(msg: impl Into<String>) -> Self {
        Self::LoanConflict(msg.into())
    }

    /// Create expired container error
    #[inline(always)]
    pub fn cache_expired(msg: impl Into<String>) -> Self {
        Self::CacheExpired(msg.into())
    }

    /// Create type mismatch error
    #[inline(always)]
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Create invalid argument error
    #[inline(always)]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create initialization error
    #[inline(always)]
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Error category for classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CapacityExceeded { .. } => ErrorCategory::Resource,
            Self::LoanConflict(_) => ErrorCategory::Concurrency,
            Self::CacheExpired(_) => ErrorCategory::Lifecycle,
            Self::TypeMismatch(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::InitializationFailed(_) | Self::WorkerUnavailable => {
                ErrorCategory::Infrastructure
            }
        }
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::CapacityExceeded { .. } => RecoveryHint::CleanupAndRetry,
            Self::LoanConflict(_) => RecoveryHint::RetryLater,
            Self::CacheExpired(_) => RecoveryHint::Reacquire,
            Self::TypeMismatch(_) | Self::InvalidArgument(_) => RecoveryHint::Fatal,
            Self::InitializationFailed(_) | Self::WorkerUnavailable => RecoveryHint::Fatal,
        }
    }

    /// Check if the caller may retry the operation
    pub fn retryable(&self) -> bool {
        !matches!(self.recovery_hint(), RecoveryHint::Fatal)
    }

    /// Get error code for programmatic handling
    pub fn code(&self) -> u32 {
        match self {
            Self::CapacityExceeded { .. } => 1001,
            Self::LoanConflict(_) => 2001,
            Self::CacheExpired(_) => 3001,
            Self::TypeMismatch(_) => 4001,
            Self::InvalidArgument(_) => 4002,
            Self::InitializationFailed(_) => 5001,
            Self::WorkerUnavailable => 5002,
        }
    }
}
