//! Token counts and refill rates.
//!
//! This module defines `Uint`, the integer type used for burst sizes and
//! token requests, and [`Limit`], the refill rate of a bucket expressed in
//! tokens per second.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Alias for the unsigned integer type used for burst sizes and token requests.
pub type Uint = u64;

/// Refill rate of a token bucket, in tokens per second.
///
/// A limit is either a finite positive rate or [`Limit::INF`], which allows
/// every request through without consuming tokens.
///
/// # Example
///
/// ```rust
/// use rate_guard_limiter::Limit;
/// use std::time::Duration;
///
/// // 50 requests every 10 seconds is one token every 200ms.
/// let limit = Limit::every(Duration::from_millis(200)).unwrap();
/// assert_eq!(limit.per_second(), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Limit(f64);

impl Limit {
    /// The unlimited rate. Requests are always granted immediately.
    pub const INF: Limit = Limit(f64::INFINITY);

    /// Creates a limit from a rate in tokens per second.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRate`] if the rate is NaN, zero or
    /// negative. `f64::INFINITY` yields [`Limit::INF`].
    pub fn new(tokens_per_second: f64) -> Result<Self, ConfigError> {
        if tokens_per_second.is_nan() || tokens_per_second <= 0.0 {
            return Err(ConfigError::InvalidRate {
                rate: tokens_per_second,
            });
        }
        Ok(Limit(tokens_per_second))
    }

    /// Creates a limit that adds one token every `interval`.
    ///
    /// A zero interval is the unlimited rate.
    pub fn every(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Ok(Limit::INF);
        }
        Limit::new(1.0 / interval.as_secs_f64())
    }

    /// Returns the rate in tokens per second.
    #[inline]
    pub fn per_second(self) -> f64 {
        self.0
    }

    /// Returns `true` for [`Limit::INF`].
    #[inline]
    pub fn is_unlimited(self) -> bool {
        self.0.is_infinite()
    }

    /// Time needed to accumulate `tokens` at this rate.
    pub(crate) fn duration_from_tokens(self, tokens: f64) -> Duration {
        if self.is_unlimited() || tokens <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(tokens / self.0).unwrap_or(Duration::MAX)
    }

    /// Tokens accumulated over `elapsed` at this rate.
    pub(crate) fn tokens_from_duration(self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        elapsed.as_secs_f64() * self.0
    }
}

impl TryFrom<f64> for Limit {
    type Error = ConfigError;

    fn try_from(tokens_per_second: f64) -> Result<Self, Self::Error> {
        Limit::new(tokens_per_second)
    }
}

impl From<Limit> for f64 {
    fn from(limit: Limit) -> f64 {
        limit.0
    }
}
