//! API key authentication middleware.
//!
//! Keys travel as `Authorization: Bearer <key>`; the Bearer prefix is
//! required. With no keys configured, authentication is a pass-through.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use serde::Serialize;
use std::{
    collections::HashSet,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

/// Paths served without credentials; `/images` carries the generated
/// files that returned URLs point at
const BYPASS_PREFIXES: &[&str] = &["/health", "/images"];

#[derive(Serialize)]
struct AuthError {
    error: AuthErrorDetail,
}

#[derive(Serialize)]
struct AuthErrorDetail {
    message: String,
    r#type: String,
    code: String,
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    api_keys: Arc<HashSet<String>>,
}

impl AuthLayer {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys.into_iter().collect()),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            api_keys: self.api_keys.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    api_keys: Arc<HashSet<String>>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
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
        let bypass = BYPASS_PREFIXES.iter().any(|p| path.starts_with(p));

        // With no keys configured, everything passes
        if bypass || self.api_keys.is_empty() {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let verdict = match header {
            None => Err("Missing API key. Provide via Authorization header: 'Bearer YOUR_API_KEY'"),
            Some(value) => match value.strip_prefix("Bearer ") {
                None => Err("Invalid API key format. Expected 'Bearer YOUR_API_KEY'"),
                Some(token) if self.api_keys.contains(token) => Ok(()),
                Some(_) => Err("Invalid API key"),
            },
        };

        match verdict {
            Ok(()) => {
                let future = self.inner.call(request);
                Box::pin(future)
            }
            Err(message) => {
                warn!(path = %path, "Rejected request: {}", message);
                let response = unauthorized(message);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let error = AuthError {
        error: AuthErrorDetail {
            message: message.to_string(),
            r#type: "authentication_error".to_string(),
            code: "invalid_api_key".to_string(),
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_layer_collects_keys() {
        let layer = AuthLayer::new(vec!["key-a".to_string(), "key-a".to_string()]);
        assert!(layer.api_keys.contains("key-a"));
        assert_eq!(layer.api_keys.len(), 1);
    }
}
