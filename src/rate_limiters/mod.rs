//! Rate limiting algorithm implementations.
//!
//! Each limiter is thread-safe and implements [`RateLimit`](crate::RateLimit),
//! so it can be shared between adapters through an `Arc`.
//!
//! # Available Algorithms
//!
//! - **[`TokenBucketLimiter`]** - Allows bursts up to capacity while maintaining average rate,
//!   with reservations of future capacity and cancellable waits
//!
//! # Thread Safety
//!
//! Limiters keep their state behind a single mutex that is held only for the
//! O(1) refill arithmetic. Waiting callers sleep without holding it.

pub mod token_bucket_limiter;
pub use token_bucket_limiter::Reservation;
pub use token_bucket_limiter::TokenBucketLimiter;
pub use token_bucket_limiter::TokenBucketLimiterConfig;
