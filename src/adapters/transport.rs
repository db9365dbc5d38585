use std::sync::Arc;

use async_trait::async_trait;

use crate::context::WaitContext;
use crate::error::GateError;
use crate::rate_limit::RateLimit;

/// One request/response exchange over some wire protocol.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    /// The outgoing message.
    type Request: Send + 'static;
    /// The reply.
    type Response: Send;
    /// Failure of the exchange itself.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `request` and returns the reply.
    async fn round_trip(
        &self,
        ctx: &WaitContext,
        request: Self::Request,
    ) -> Result<Self::Response, Self::Error>;
}

#[async_trait]
impl<T: RoundTrip + ?Sized> RoundTrip for Arc<T> {
    type Request = T::Request;
    type Response = T::Response;
    type Error = T::Error;

    async fn round_trip(
        &self,
        ctx: &WaitContext,
        request: Self::Request,
    ) -> Result<Self::Response, Self::Error> {
        (**self).round_trip(ctx, request).await
    }
}

/// A [`RoundTrip`] that waits for a token before every exchange.
///
/// The wait happens before the inner exchange starts; if it fails the request
/// is never sent.
#[derive(Debug)]
pub struct RateLimitTransport<T> {
    inner: T,
    limiter: Arc<dyn RateLimit>,
}

impl<T: RoundTrip> RateLimitTransport<T> {
    /// Wraps `inner`, drawing one token from `limiter` per exchange.
    pub fn new(inner: T, limiter: Arc<dyn RateLimit>) -> Self {
        Self { inner, limiter }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &Arc<dyn RateLimit> {
        &self.limiter
    }
}

#[async_trait]
impl<T: RoundTrip> RoundTrip for RateLimitTransport<T> {
    type Request = T::Request;
    type Response = T::Response;
    type Error = GateError<T::Error>;

    async fn round_trip(
        &self,
        ctx: &WaitContext,
        request: Self::Request,
    ) -> Result<Self::Response, Self::Error> {
        self.limiter.wait_one(ctx).await?;
        self.inner
            .round_trip(ctx, request)
            .await
            .map_err(GateError::Inner)
    }
}
