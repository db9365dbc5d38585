use std::sync::Arc;

use tracing::debug;

use crate::context::WaitContext;
use crate::error::GateError;
use crate::rate_limit::RateLimit;

use super::RoundTrip;

/// A client that waits on a shared limiter before dispatching each request.
///
/// Limiter errors are returned as [`GateError::Limited`] and the request is
/// not dispatched.
#[derive(Debug)]
pub struct RateLimitClient<T> {
    transport: T,
    limiter: Arc<dyn RateLimit>,
}

impl<T: RoundTrip> RateLimitClient<T> {
    /// Creates a client sending through `transport`, gated by `limiter`.
    pub fn new(transport: T, limiter: Arc<dyn RateLimit>) -> Self {
        Self { transport, limiter }
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &Arc<dyn RateLimit> {
        &self.limiter
    }

    /// Sends `request` with a context that is never cancelled.
    pub async fn send(&self, request: T::Request) -> Result<T::Response, GateError<T::Error>> {
        self.send_with(&WaitContext::background(), request).await
    }

    /// Sends `request`, giving up if `ctx` is cancelled while waiting.
    pub async fn send_with(
        &self,
        ctx: &WaitContext,
        request: T::Request,
    ) -> Result<T::Response, GateError<T::Error>> {
        if let Err(err) = self.limiter.wait_one(ctx).await {
            debug!(error = %err, "request not dispatched");
            return Err(GateError::Limited(err));
        }
        self.transport
            .round_trip(ctx, request)
            .await
            .map_err(GateError::Inner)
    }
}
