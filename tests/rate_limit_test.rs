//! Functional tests for rate limiting

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use image_edit_server::middleware::rate_limit::RateLimitLayer;
use tower::ServiceExt;

fn create_test_app(rps: u32, burst: u32) -> Router {
    Router::new()
        .route("/test", axum::routing::get(|| async { "OK" }))
        .layer(RateLimitLayer::new(rps, burst))
}

#[tokio::test]
async fn test_rate_limit_allows_within_limit() {
    let app = create_test_app(100, 100);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_rejects_beyond_burst() {
    let app = create_test_app(1, 1);

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(
            Request::builder()
                .uri("/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_health_bypass() {
    let app = Router::new()
        .route("/health", axum::routing::get(|| async { "healthy" }))
        .layer(RateLimitLayer::new(1, 1));

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_rate_limit_images_bypass() {
    let app = Router::new()
        .route("/images/x.png", axum::routing::get(|| async { "png" }))
        .layer(RateLimitLayer::new(1, 1));

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/images/x.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
