//! A token bucket rate limiter for Rust applications.
//!
//! The limiter throttles how often callers may proceed with an action, such
//! as sending an outbound request. It enforces a steady-state rate while
//! allowing bursts up to a fixed capacity, and it is safe to share between
//! threads and tasks.
//!
//! # Quick Start
//!
//! ```rust
//! use rate_guard_limiter::{TokenBucketLimiter, WaitContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rate_guard_limiter::RateLimitError> {
//! // 5 requests per second, one at a time.
//! let limiter = TokenBucketLimiter::new(5.0, 1)?;
//!
//! // Non-blocking check
//! if limiter.try_acquire(1)? {
//!     println!("Request allowed");
//! }
//!
//! // Suspend until the next token accrues
//! limiter.wait(&WaitContext::background(), 1).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Operations
//!
//! - **[`try_acquire`](TokenBucketLimiter::try_acquire)** - take tokens now or report that there are too few
//! - **[`reserve`](TokenBucketLimiter::reserve)** - debit tokens now and learn when they may be used;
//!   the [`Reservation`] can be cancelled to give them back
//! - **[`wait`](TokenBucketLimiter::wait)** - suspend until tokens are available, racing a
//!   [`WaitContext`] carrying a cancellation token and an optional deadline
//!
//! All three are also available through the [`RateLimit`] trait, which is
//! what the [`adapters`] hold.
//!
//! # Error Handling
//!
//! Operations return [`RateLimitError`]:
//! - **[`InvalidConfig`](RateLimitError::InvalidConfig)** - bad rate or burst at construction
//! - **[`InvalidRequest`](RateLimitError::InvalidRequest)** - zero tokens, or more than the burst
//! - **[`Cancelled`](RateLimitError::Cancelled)** - the wait was cancelled
//! - **[`DeadlineExceeded`](RateLimitError::DeadlineExceeded)** - the deadline came first
//!
//! The limiter never retries; that is up to the caller.
//!
//! # Time
//!
//! Time is read through the [`Clock`] trait. [`MonoClock`] follows
//! `tokio::time::Instant`, which is monotonic and honours tokio's paused
//! test clock. [`ManualClock`] only moves when advanced.

pub mod adapters;
pub mod clock;
pub mod context;
pub mod error;
pub mod rate_limit;
pub mod rate_limiters;
pub mod types;

pub use clock::{Clock, ManualClock, MonoClock};
pub use context::WaitContext;
pub use error::{ConfigError, GateError, RateLimitError, RateLimitResult};
pub use rate_limit::RateLimit;
pub use rate_limiters::{Reservation, TokenBucketLimiter, TokenBucketLimiterConfig};
pub use types::{Limit, Uint};
