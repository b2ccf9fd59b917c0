//! Per-client-address rate limiting for the login endpoint.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{header::RETRY_AFTER, HeaderValue},
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;
use usermgmt_core::Error;

use crate::error::ApiError;

/// Tracked client addresses above which stale limiter state is pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Keyed limiter admitting `attempts_per_minute` logins per client address.
#[derive(Clone)]
pub struct LoginRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
}

impl LoginRateLimiter {
    /// Creates a limiter; `None` when `attempts_per_minute` is zero (limiting disabled).
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Option<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(attempts_per_minute)?);
        Some(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
        })
    }

    /// Records an attempt from `client`; returns the seconds to wait when over quota.
    pub fn check(&self, client: IpAddr) -> Result<(), u64> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&client).map_err(|not_until| {
            not_until
                .wait_time_from(self.clock.now())
                .as_secs()
                .max(1)
        })
    }
}

/// Layer applying [`LoginRateLimiter`] to the wrapped routes.
#[derive(Clone)]
pub struct LoginRateLimitLayer {
    limiter: Option<LoginRateLimiter>,
}

impl LoginRateLimitLayer {
    /// Creates the layer; a limit of zero disables limiting.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        Self {
            limiter: LoginRateLimiter::new(attempts_per_minute),
        }
    }
}

impl<S> Layer<S> for LoginRateLimitLayer {
    type Service = LoginRateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoginRateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct LoginRateLimitService<S> {
    inner: S,
    limiter: Option<LoginRateLimiter>,
}

impl<S> Service<Request<Body>> for LoginRateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if let Some(limiter) = limiter {
                let client = client_address(&request);
                if let Err(retry_after) = limiter.check(client) {
                    warn!(%client, retry_after, "login rate limit exceeded");
                    return Ok(rate_limited_response(retry_after));
                }
            }
            inner.call(request).await
        })
    }
}

fn client_address(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| {
            addr.ip()
        })
}

fn rate_limited_response(retry_after: u64) -> Response {
    let mut response = ApiError(Error::RateLimited(format!(
        "too many login attempts, retry in {retry_after}s"
    )))
    .into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_limiting() {
        assert!(LoginRateLimiter::new(0).is_none());
    }

    #[test]
    fn limits_per_address() {
        let limiter = LoginRateLimiter::new(2).unwrap();
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(first).is_ok());
        assert!(limiter.check(first).is_ok());
        let wait = limiter.check(first).unwrap_err();
        assert!(wait >= 1);

        assert!(limiter.check(second).is_ok());
    }
}
