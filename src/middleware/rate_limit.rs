//! Rate limiting middleware using the Governor crate

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::Serialize;
use std::{
    num::NonZeroU32,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

/// Paths never throttled
const BYPASS_PREFIXES: &[&str] = &["/health", "/images"];

#[derive(Serialize)]
struct RateLimitError {
    error: RateLimitErrorDetail,
}

#[derive(Serialize)]
struct RateLimitErrorDetail {
    message: String,
    r#type: String,
    code: String,
}

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>;

/// Rate limiting layer
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: SharedRateLimiter,
}

impl RateLimitLayer {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(20).unwrap());
        let burst = NonZeroU32::new(burst_size).unwrap_or(rps);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting middleware service
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: SharedRateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path();
        if BYPASS_PREFIXES.iter().any(|p| path.starts_with(p)) {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        match self.limiter.check() {
            Ok(_) => {
                let future = self.inner.call(request);
                Box::pin(future)
            }
            Err(_) => {
                warn!(path = %path, "Rate limit exceeded");
                let response = too_many_requests();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

fn too_many_requests() -> Response {
    let error = RateLimitError {
        error: RateLimitErrorDetail {
            message: "Rate limit exceeded. Please slow down your requests.".to_string(),
            r#type: "rate_limit_error".to_string(),
            code: "rate_limit_exceeded".to_string(),
        },
    };

    (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_layer_creation() {
        let layer = RateLimitLayer::new(100, 200);
        assert!(layer.limiter.check().is_ok());
    }

    #[test]
    fn test_zero_rps_falls_back() {
        // NonZero fallback path; must not panic
        let _ = RateLimitLayer::new(0, 0);
    }
}
