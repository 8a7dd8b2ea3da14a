//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid credential record: {0}")]
    Validation(String),

    #[error("duplicate ip: {0}")]
    Duplicate(String),

    #[error("pool exhausted: no credentials available")]
    PoolExhausted,

    #[error("lease not found: {0}")]
    NotFound(String),

    #[error("storage write failed: {0}")]
    Storage(String),
}

impl Error {
    /// Stable kind label for wire responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Duplicate(_) => "duplicate",
            Error::PoolExhausted => "pool_exhausted",
            Error::NotFound(_) => "not_found",
            Error::Storage(_) => "storage",
        }
    }
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
