//! Cancellation and deadline carried into a wait.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The signal a caller hands to [`wait`](crate::RateLimit::wait).
///
/// A context may carry a [`CancellationToken`], a deadline, both, or
/// neither ([`WaitContext::background`]). A timeout is a deadline computed
/// from the current instant.
///
/// # Example
///
/// ```rust
/// use rate_guard_limiter::WaitContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = WaitContext::background().with_cancellation(token.clone());
/// assert!(!ctx.is_cancelled());
///
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl WaitContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Attaches a deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attaches a deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a new deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Returns `true` if the deadline is at or before `now`.
    pub(crate) fn deadline_passed(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Completes when the cancellation token fires; never completes without one.
    pub(crate) async fn cancelled(&self) {
        match &self.token {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }
}
