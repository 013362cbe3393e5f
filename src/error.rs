//! cubecache error types

/// cubecache error types
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    // Result materialization errors
    /// Growing a tuple buffer would exceed the configured result limit.
    ///
    /// Fatal to the result-construction phase that raised it. Never retried
    /// and never downgraded to truncation.
    #[error("result ({size}) exceeded limit ({limit})")]
    ResourceLimitExceeded { size: usize, limit: i64 },

    #[error("index {index} out of range for buffer of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("tuple arity mismatch: expected {expected} members, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    // Data errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Executor errors
    #[error("executor has been shut down")]
    ExecutorShutdown,
}

impl CubeError {
    /// Whether this error is the result-limit safety valve tripping.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, CubeError::ResourceLimitExceeded { .. })
    }
}

/// Result type alias for cubecache operations
pub type Result<T> = std::result::Result<T, CubeError>;
