//! Cache Error Types

use thiserror::Error;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failure.
    #[error("Redis error: {0}")]
    Redis(#[from] fred::prelude::Error),

    /// A stored value or script reply had an unexpected shape.
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    /// Backend unreachable for a reason other than a Redis error.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}
