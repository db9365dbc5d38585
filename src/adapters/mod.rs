//! Adapters that put a shared limiter in front of an operation.
//!
//! The adapters never own a limiter. They hold an `Arc<dyn RateLimit>`, so a
//! client and the transport beneath it can draw from the same bucket.
//!
//! A caller that does not need an adapter waits on the limiter directly
//! before acting:
//!
//! ```rust
//! use rate_guard_limiter::{RateLimit, TokenBucketLimiter, WaitContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rate_guard_limiter::RateLimitError> {
//! let limiter = TokenBucketLimiter::new(100.0, 1)?;
//! let ctx = WaitContext::background();
//!
//! for _ in 0..3 {
//!     limiter.wait_one(&ctx).await?;
//!     // send the request here
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod transport;

pub use client::RateLimitClient;
pub use transport::{RateLimitTransport, RoundTrip};
