//! error.rs
//! Defines the configuration, limiter and adapter error types.

use crate::types::Uint;

/// Invalid limiter parameters. Raised at construction and never recoverable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The rate is NaN, zero or negative.
    #[error("Invalid rate limit: {rate}. Rate must be positive or infinite.")]
    InvalidRate {
        /// The rejected rate, in tokens per second.
        rate: f64,
    },

    /// The burst size is zero.
    #[error("Invalid burst size: {burst}. Burst must be at least 1.")]
    InvalidBurst {
        /// The rejected burst size.
        burst: Uint,
    },
}

/// Errors returned by rate limiter operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitError {
    /// The limiter could not be built from the given parameters.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The request asks for zero tokens or more than the bucket can ever hold.
    #[error("Invalid token request: tried to acquire {requested}, burst {burst}. This request cannot succeed.")]
    InvalidRequest {
        /// Tokens requested.
        requested: Uint,
        /// Configured burst size.
        burst: Uint,
    },

    /// The caller's cancellation signal fired while waiting.
    #[error("Wait cancelled before tokens became available.")]
    Cancelled,

    /// The caller's deadline passed, or would pass before tokens become available.
    #[error("Deadline exceeded while waiting for tokens.")]
    DeadlineExceeded,
}

/// Result type for limiter operations.
pub type RateLimitResult<T = ()> = Result<T, RateLimitError>;

/// Error returned by the rate limited adapters.
///
/// A [`GateError::Limited`] means the wrapped action never ran.
#[derive(Debug, thiserror::Error)]
pub enum GateError<E> {
    /// The limiter refused or aborted the wait.
    #[error("rate limiter: {0}")]
    Limited(#[source] RateLimitError),

    /// The wrapped operation failed after permission was granted.
    #[error(transparent)]
    Inner(E),
}

impl<E> From<RateLimitError> for GateError<E> {
    fn from(err: RateLimitError) -> Self {
        GateError::Limited(err)
    }
}
