//! Core trait for rate limiters.
//!
//! This module defines the capability the adapters depend on: a non-blocking
//! acquire, a reservation of future capacity, and a cancellable wait.

use std::fmt::Debug;

use async_trait::async_trait;

pub use crate::types::Uint;
use crate::context::WaitContext;
use crate::rate_limiters::Reservation;
use crate::RateLimitResult;

/// The capability implemented by rate limiters.
///
/// Adapters hold an `Arc<dyn RateLimit>` so several of them can share one
/// bucket.
#[async_trait]
pub trait RateLimit: Debug + Send + Sync {
    /// Takes `tokens` if they are available right now.
    ///
    /// # Returns
    /// * `Ok(true)` if the tokens were taken
    /// * `Ok(false)` if not enough tokens are available; nothing is taken
    /// * `Err(InvalidRequest)` if `tokens` is zero or larger than the burst
    fn try_acquire(&self, tokens: Uint) -> RateLimitResult<bool>;

    /// Debits `tokens` now and reports when they become usable.
    ///
    /// # Returns
    /// * `Ok(Reservation)` whose delay may be zero
    /// * `Err(InvalidRequest)` if `tokens` is zero or larger than the burst
    fn reserve(&self, tokens: Uint) -> RateLimitResult<Reservation<'_>>;

    /// Suspends until `tokens` are available or `ctx` is cancelled.
    ///
    /// # Returns
    /// * `Ok(())` once the action is permitted
    /// * `Err(Cancelled)` if the cancellation token fired first
    /// * `Err(DeadlineExceeded)` if the deadline passes before the tokens accrue
    /// * `Err(InvalidRequest)` if `tokens` is zero or larger than the burst
    async fn wait(&self, ctx: &WaitContext, tokens: Uint) -> RateLimitResult;

    /// Shorthand for `try_acquire(1)`.
    fn allow(&self) -> bool {
        self.try_acquire(1).unwrap_or(false)
    }

    /// Shorthand for `wait(ctx, 1)`.
    async fn wait_one(&self, ctx: &WaitContext) -> RateLimitResult {
        self.wait(ctx, 1).await
    }
}
