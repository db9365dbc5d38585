use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::clock::{Clock, MonoClock};
use crate::context::WaitContext;
use crate::error::ConfigError;
use crate::rate_limit::RateLimit;
use crate::{Limit, RateLimitError, RateLimitResult, Uint};

/// Token bucket rate limiter with reservations and cancellable waits.
///
/// The bucket holds up to `burst` tokens and refills continuously at the
/// configured [`Limit`]. Each action consumes tokens; an action that finds
/// too few tokens can be rejected ([`try_acquire`](Self::try_acquire)),
/// scheduled ([`reserve`](Self::reserve)) or awaited ([`wait`](Self::wait)).
///
/// # Algorithm Behavior
///
/// - The bucket starts full with `burst` tokens
/// - Tokens accrue linearly with elapsed time, capped at `burst`
/// - A reservation debits its tokens immediately, possibly driving the count
///   negative; later callers see the debt and compute later times
/// - There is no waiter queue: ordering comes only from that debt
///
/// All state sits behind one mutex, held only for the refill arithmetic and
/// never while a caller sleeps.
///
/// # Example
///
/// ```rust
/// use rate_guard_limiter::TokenBucketLimiter;
///
/// // 5 tokens per second, bursts of up to 10.
/// let limiter = TokenBucketLimiter::new(5.0, 10).unwrap();
///
/// assert_eq!(limiter.try_acquire(10), Ok(true));
/// assert_eq!(limiter.try_acquire(1), Ok(false));
/// ```
pub struct TokenBucketLimiter {
    /// Time source for refill calculations
    clock: Arc<dyn Clock>,
    /// Bucket state protected by mutex for thread safety
    state: Mutex<TokenBucketLimiterState>,
}

/// Internal state of the token bucket
struct TokenBucketLimiterState {
    /// Refill rate
    limit: Limit,
    /// Maximum number of tokens the bucket can hold
    burst: Uint,
    /// Current token count; negative while reservations are outstanding
    tokens: f64,
    /// Instant of the last reconciliation
    last_update: Instant,
}

impl TokenBucketLimiterState {
    fn check_request(&self, tokens: Uint) -> RateLimitResult {
        if tokens == 0 || tokens > self.burst {
            return Err(RateLimitError::InvalidRequest {
                requested: tokens,
                burst: self.burst,
            });
        }
        Ok(())
    }

    /// Token count at `now` without touching the state.
    fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_update);
        let refilled = self.tokens + self.limit.tokens_from_duration(elapsed);
        refilled.min(self.burst as f64)
    }

    /// Brings `tokens` up to date with `now`.
    fn advance(&mut self, now: Instant) -> f64 {
        self.tokens = self.tokens_at(now);
        if now > self.last_update {
            self.last_update = now;
        }
        self.tokens
    }
}

impl TokenBucketLimiter {
    /// Creates a limiter refilling `rate` tokens per second with room for
    /// `burst` tokens, reading time from [`MonoClock`].
    ///
    /// `f64::INFINITY` disables limiting.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] if `rate` is NaN, zero or
    /// negative, or if `burst` is zero.
    pub fn new(rate: f64, burst: Uint) -> RateLimitResult<Self> {
        Self::from_limit(Limit::new(rate)?, burst)
    }

    /// Creates a limiter from an already validated [`Limit`].
    pub fn from_limit(limit: Limit, burst: Uint) -> RateLimitResult<Self> {
        Self::with_clock(limit, burst, MonoClock)
    }

    /// Creates a limiter that reads time from `clock`.
    ///
    /// [`wait`](Self::wait) always sleeps on the tokio timer, so clocks other
    /// than [`MonoClock`] are meant for the non-blocking operations.
    pub fn with_clock<C>(limit: Limit, burst: Uint, clock: C) -> RateLimitResult<Self>
    where
        C: Clock + 'static,
    {
        if burst == 0 {
            return Err(ConfigError::InvalidBurst { burst }.into());
        }

        let now = clock.now();
        debug!(rate = limit.per_second(), burst, "token bucket limiter created");

        Ok(TokenBucketLimiter {
            clock: Arc::new(clock),
            state: Mutex::new(TokenBucketLimiterState {
                limit,
                burst,
                tokens: burst as f64, // Bucket starts full
                last_update: now,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucketLimiterState> {
        // The guarded arithmetic cannot panic halfway, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the refill rate.
    pub fn limit(&self) -> Limit {
        self.lock().limit
    }

    /// Returns the bucket capacity.
    pub fn burst(&self) -> Uint {
        self.lock().burst
    }

    /// Returns the number of tokens available now.
    ///
    /// The value is negative while reservations are waiting for capacity.
    pub fn tokens(&self) -> f64 {
        let state = self.lock();
        state.tokens_at(self.clock.now())
    }

    /// Changes the refill rate. Tokens accrued so far are kept.
    pub fn set_limit(&self, limit: Limit) {
        let mut state = self.lock();
        state.advance(self.clock.now());
        state.limit = limit;
        debug!(rate = limit.per_second(), "token bucket limit changed");
    }

    /// Changes the bucket capacity, discarding tokens above the new capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] if `burst` is zero.
    pub fn set_burst(&self, burst: Uint) -> RateLimitResult {
        if burst == 0 {
            return Err(ConfigError::InvalidBurst { burst }.into());
        }
        let mut state = self.lock();
        state.advance(self.clock.now());
        state.burst = burst;
        state.tokens = state.tokens.min(burst as f64);
        debug!(burst, "token bucket burst changed");
        Ok(())
    }

    /// Takes `tokens` if they are available right now.
    ///
    /// # Returns
    /// * `Ok(true)` - The tokens were taken
    /// * `Ok(false)` - Not enough tokens; the bucket is left unchanged
    /// * `Err(RateLimitError::InvalidRequest)` - `tokens` is zero or exceeds the burst
    ///
    /// # Example
    ///
    /// ```rust
    /// use rate_guard_limiter::{RateLimitError, TokenBucketLimiter};
    ///
    /// let limiter = TokenBucketLimiter::new(1.0, 3).unwrap();
    /// assert_eq!(limiter.try_acquire(2), Ok(true));
    /// assert_eq!(limiter.try_acquire(2), Ok(false));
    /// assert!(matches!(
    ///     limiter.try_acquire(4),
    ///     Err(RateLimitError::InvalidRequest { requested: 4, burst: 3 })
    /// ));
    /// ```
    pub fn try_acquire(&self, tokens: Uint) -> RateLimitResult<bool> {
        let mut state = self.lock();
        state.check_request(tokens)?;

        if state.limit.is_unlimited() {
            return Ok(true);
        }

        let available = state.advance(self.clock.now());
        if available >= tokens as f64 {
            state.tokens -= tokens as f64;
            trace!(tokens, remaining = state.tokens, "tokens acquired");
            Ok(true)
        } else {
            trace!(tokens, available, "tokens denied");
            Ok(false)
        }
    }

    /// Debits `tokens` now and returns when they may be used.
    ///
    /// The debit is visible to every later call, so a second reservation made
    /// at the same instant gets a later time. Dropping the reservation keeps
    /// the debit; [`Reservation::cancel`] gives it back.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidRequest`] if `tokens` is zero or
    /// exceeds the burst.
    pub fn reserve(&self, tokens: Uint) -> RateLimitResult<Reservation<'_>> {
        let mut state = self.lock();
        state.check_request(tokens)?;
        let now = self.clock.now();

        if state.limit.is_unlimited() {
            return Ok(Reservation {
                limiter: self,
                tokens,
                debited: false,
                time_to_act: now,
            });
        }

        let remaining = state.advance(now) - tokens as f64;
        let wait = state.limit.duration_from_tokens(-remaining);
        state.tokens = remaining;

        trace!(tokens, remaining, wait = ?wait, "tokens reserved");

        Ok(Reservation {
            limiter: self,
            tokens,
            debited: true,
            time_to_act: instant_after(now, wait),
        })
    }

    /// Waits until `tokens` may be used, or until `ctx` is cancelled.
    ///
    /// The limiter's lock is only held while reserving and, on cancellation,
    /// while returning the tokens. If the deadline of `ctx` falls before the
    /// tokens become available, the call fails right away instead of sleeping
    /// into a certain timeout. Dropping the returned future before it
    /// completes also returns the tokens.
    ///
    /// # Errors
    ///
    /// * [`RateLimitError::InvalidRequest`] - `tokens` is zero or exceeds the burst
    /// * [`RateLimitError::Cancelled`] - the cancellation token fired
    /// * [`RateLimitError::DeadlineExceeded`] - the deadline passed or would pass first
    pub async fn wait(&self, ctx: &WaitContext, tokens: Uint) -> RateLimitResult {
        self.lock().check_request(tokens)?;

        if ctx.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }
        if ctx.deadline_passed(self.clock.now()) {
            return Err(RateLimitError::DeadlineExceeded);
        }

        let reservation = self.reserve(tokens)?;
        let time_to_act = reservation.time_to_act();

        if ctx.deadline().is_some_and(|deadline| time_to_act > deadline) {
            debug!(tokens, "wait would exceed deadline");
            reservation.cancel();
            return Err(RateLimitError::DeadlineExceeded);
        }

        let delay = reservation.delay();
        if delay.is_zero() {
            return Ok(());
        }

        debug!(tokens, delay = ?delay, "waiting for tokens");
        let pending = PendingReservation(Some(reservation));

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                pending.cancel();
                debug!(tokens, "wait cancelled");
                Err(RateLimitError::Cancelled)
            }
            _ = tokio::time::sleep_until(time_to_act) => {
                pending.commit();
                Ok(())
            }
        }
    }

    /// Returns `tokens` held by a reservation maturing at `time_to_act`.
    fn refund(&self, tokens: Uint, time_to_act: Instant) {
        let mut state = self.lock();
        let now = self.clock.now();
        if time_to_act < now {
            return;
        }

        state.advance(now);
        state.tokens = (state.tokens + tokens as f64).min(state.burst as f64);
        trace!(tokens, restored = state.tokens, "reservation cancelled");
    }
}

/// About 30 years, the horizon tokio itself uses for "never".
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + wait`, saturating to a far-future instant when the sum overflows.
fn instant_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenBucketLimiter")
            .field("limit", &state.limit)
            .field("burst", &state.burst)
            .field("tokens", &state.tokens)
            .finish()
    }
}

#[async_trait]
impl RateLimit for TokenBucketLimiter {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> RateLimitResult<bool> {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn reserve(&self, tokens: Uint) -> RateLimitResult<Reservation<'_>> {
        self.reserve(tokens)
    }

    async fn wait(&self, ctx: &WaitContext, tokens: Uint) -> RateLimitResult {
        self.wait(ctx, tokens).await
    }
}

/// Tokens debited from a [`TokenBucketLimiter`] for use at a given instant.
///
/// Dropping a reservation keeps its tokens spent.
#[derive(Debug)]
#[must_use = "dropping a reservation keeps its tokens spent; call `cancel` to return them"]
pub struct Reservation<'a> {
    limiter: &'a TokenBucketLimiter,
    tokens: Uint,
    debited: bool,
    time_to_act: Instant,
}

impl Reservation<'_> {
    /// Number of tokens reserved.
    pub fn tokens(&self) -> Uint {
        self.tokens
    }

    /// Instant at which the reserved tokens may be used.
    pub fn time_to_act(&self) -> Instant {
        self.time_to_act
    }

    /// Time left until the tokens may be used, measured on the limiter's clock.
    pub fn delay(&self) -> Duration {
        self.delay_from(self.limiter.clock.now())
    }

    /// Time from `now` until the tokens may be used; zero if already usable.
    pub fn delay_from(&self, now: Instant) -> Duration {
        self.time_to_act.saturating_duration_since(now)
    }

    /// Gives the tokens back to the bucket.
    ///
    /// Has no effect once the reservation's time has passed.
    pub fn cancel(self) {
        if self.debited {
            self.limiter.refund(self.tokens, self.time_to_act);
        }
    }
}

/// A reservation held across the sleep in `wait`; cancelled unless committed.
struct PendingReservation<'a>(Option<Reservation<'a>>);

impl PendingReservation<'_> {
    fn commit(mut self) {
        self.0.take();
    }

    fn cancel(mut self) {
        if let Some(reservation) = self.0.take() {
            reservation.cancel();
        }
    }
}

impl Drop for PendingReservation<'_> {
    fn drop(&mut self) {
        if let Some(reservation) = self.0.take() {
            reservation.cancel();
        }
    }
}

/// Configuration structure for creating a `TokenBucketLimiter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketLimiterConfig {
    /// Refill rate in tokens per second.
    pub rate: f64,
    /// Maximum number of tokens the bucket can hold.
    pub burst: Uint,
}

impl TokenBucketLimiterConfig {
    /// Creates a new configuration instance.
    pub fn new(rate: f64, burst: Uint) -> Self {
        Self { rate, burst }
    }
}

impl Default for TokenBucketLimiterConfig {
    fn default() -> Self {
        Self {
            rate: 1000.0,
            burst: 10000,
        }
    }
}

impl TryFrom<TokenBucketLimiterConfig> for TokenBucketLimiter {
    type Error = RateLimitError;

    /// Converts a `TokenBucketLimiterConfig` into a `TokenBucketLimiter`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rate_guard_limiter::rate_limiters::{TokenBucketLimiter, TokenBucketLimiterConfig};
    ///
    /// let limiter = TokenBucketLimiter::try_from(TokenBucketLimiterConfig::new(10.0, 5)).unwrap();
    /// assert_eq!(limiter.burst(), 5);
    ///
    /// let invalid: Result<TokenBucketLimiter, _> = TokenBucketLimiterConfig::new(0.0, 5).try_into();
    /// assert!(invalid.is_err());
    /// ```
    fn try_from(config: TokenBucketLimiterConfig) -> Result<Self, Self::Error> {
        TokenBucketLimiter::new(config.rate, config.burst)
    }
}
