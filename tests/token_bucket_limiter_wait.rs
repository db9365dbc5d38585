use std::sync::Arc;
use std::time::Duration;

use rate_guard_limiter::{Limit, RateLimit, RateLimitError, TokenBucketLimiter, WaitContext};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(10),
        "expected about {expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_sequential_waits_follow_rate() {
    let limiter = TokenBucketLimiter::new(5.0, 1).unwrap();
    let ctx = WaitContext::background();
    let start = Instant::now();

    // One request every 200ms: 0, 0.2, 0.4, ..., 1.8 seconds
    for i in 0..10u32 {
        limiter.wait(&ctx, 1).await.unwrap();
        assert_close(start.elapsed(), Duration::from_millis(200) * i);
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_within_burst_is_immediate() {
    let limiter = TokenBucketLimiter::new(1.0, 3).unwrap();
    let ctx = WaitContext::background();
    let start = Instant::now();

    limiter.wait(&ctx, 2).await.unwrap();
    limiter.wait_one(&ctx).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_wait_rejects_invalid_requests() {
    let limiter = TokenBucketLimiter::new(1.0, 3).unwrap();
    let ctx = WaitContext::background();

    assert_eq!(
        limiter.wait(&ctx, 0).await,
        Err(RateLimitError::InvalidRequest { requested: 0, burst: 3 })
    );
    assert_eq!(
        limiter.wait(&ctx, 4).await,
        Err(RateLimitError::InvalidRequest { requested: 4, burst: 3 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_already_cancelled() {
    let limiter = TokenBucketLimiter::new(1.0, 2).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = WaitContext::background().with_cancellation(token);
    let start = Instant::now();

    assert_eq!(limiter.wait(&ctx, 1).await, Err(RateLimitError::Cancelled));
    assert_eq!(start.elapsed(), Duration::ZERO);

    // Nothing was debited
    assert_eq!(limiter.try_acquire(2), Ok(true));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_returns_tokens() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));

    let token = CancellationToken::new();
    let ctx = WaitContext::background().with_cancellation(token.clone());
    let start = Instant::now();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    };
    let (result, ()) = tokio::join!(limiter.wait(&ctx, 1), canceller);

    assert_eq!(result, Err(RateLimitError::Cancelled));
    assert_close(start.elapsed(), Duration::from_millis(100));

    // The refunded token leaves the bucket where 100ms of refill put it
    assert!((limiter.tokens() - 0.1).abs() < 0.01);

    // So the next full token is about 900ms away
    let start = Instant::now();
    limiter.wait(&WaitContext::background(), 1).await.unwrap();
    assert_close(start.elapsed(), Duration::from_millis(900));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_returns_tokens() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background();

    let result = tokio::time::timeout(Duration::from_millis(100), limiter.wait(&ctx, 1)).await;
    assert!(result.is_err());

    assert!((limiter.tokens() - 0.1).abs() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_too_close_fails_fast() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background().with_timeout(Duration::from_millis(500));
    let start = Instant::now();

    assert_eq!(
        limiter.wait(&ctx, 1).await,
        Err(RateLimitError::DeadlineExceeded)
    );
    assert_eq!(start.elapsed(), Duration::ZERO);

    // The reservation made to compute the delay was handed back
    assert_eq!(limiter.tokens(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_already_passed() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    let ctx = WaitContext::background().with_deadline(Instant::now());

    assert_eq!(
        limiter.wait(&ctx, 1).await,
        Err(RateLimitError::DeadlineExceeded)
    );
    assert_eq!(limiter.try_acquire(1), Ok(true));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_far_enough_succeeds() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background().with_timeout(Duration::from_secs(2));
    let start = Instant::now();

    limiter.wait(&ctx, 1).await.unwrap();
    assert_close(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_tiny_rate_wait_with_deadline_fails() {
    let limiter = TokenBucketLimiter::new(1e-20, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background().with_timeout(Duration::from_secs(1));
    let start = Instant::now();

    assert_eq!(
        limiter.wait(&ctx, 1).await,
        Err(RateLimitError::DeadlineExceeded)
    );
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.tokens(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_tiny_rate_wait_without_deadline_stays_pending() {
    let limiter = TokenBucketLimiter::new(1e-20, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background();

    let result = tokio::time::timeout(Duration::from_secs(3600), limiter.wait(&ctx, 1)).await;
    assert!(result.is_err());

    // Dropping the pending wait handed its reservation back
    assert!(limiter.tokens() >= 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_sets_no_deadline() {
    let limiter = TokenBucketLimiter::new(1.0, 1).unwrap();
    assert_eq!(limiter.try_acquire(1), Ok(true));
    let ctx = WaitContext::background().with_timeout(Duration::MAX);
    assert_eq!(ctx.deadline(), None);

    let start = Instant::now();
    limiter.wait(&ctx, 1).await.unwrap();
    assert_close(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_unlimited_wait_never_blocks() {
    let limiter = TokenBucketLimiter::from_limit(Limit::INF, 1).unwrap();
    let ctx = WaitContext::background();
    let start = Instant::now();

    for _ in 0..100 {
        limiter.wait(&ctx, 1).await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waiters_share_the_rate() {
    let limiter = Arc::new(TokenBucketLimiter::new(10.0, 1).unwrap());
    let start = Instant::now();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                let ctx = WaitContext::background();
                limiter.wait(&ctx, 1).await.map(|()| start.elapsed())
            })
        })
        .collect();

    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap().unwrap());
    }
    finished.sort();

    // One grant every 100ms regardless of which task got which slot
    for (i, elapsed) in finished.into_iter().enumerate() {
        assert_close(elapsed, Duration::from_millis(100) * i as u32);
    }
}

#[tokio::test(start_paused = true)]
async fn test_long_waiter_does_not_block_try_acquire() {
    let limiter = Arc::new(TokenBucketLimiter::new(1.0, 10).unwrap());
    assert_eq!(limiter.try_acquire(10), Ok(true));

    let waiter = {
        let limiter = Arc::clone(&limiter);
        tokio::spawn(async move { limiter.wait(&WaitContext::background(), 10).await })
    };
    while limiter.tokens() >= 0.0 {
        tokio::task::yield_now().await;
    }

    // The waiter holds a reservation, not the lock
    assert_eq!(limiter.try_acquire(1), Ok(false));
    assert_eq!(limiter.burst(), 10);

    waiter.await.unwrap().unwrap();
}
