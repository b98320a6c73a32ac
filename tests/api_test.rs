//! End-to-end router tests with a mock pipeline

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tokio::sync::RwLock;
use tower::ServiceExt;

use image_edit_server::api::routes;
use image_edit_server::api::schema::{ImageGenerationResponse, ModelListResponse};
use image_edit_server::config::Settings;
use image_edit_server::engine::{ImagePipeline, InferenceInput, InferenceOutput, ModelEngine};
use image_edit_server::queue::SerialQueue;
use image_edit_server::response::{base64, ResponseHandler};
use image_edit_server::AppState;

struct CountingPipeline {
    calls: Arc<AtomicU32>,
}

impl ImagePipeline for CountingPipeline {
    fn model_id(&self) -> &str {
        "mock-edit-model"
    }

    fn infer(&mut self, input: InferenceInput) -> image_edit_server::Result<InferenceOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(InferenceOutput {
            image: format!("{}#{}", input.prompt, input.seed).into_bytes(),
            seed: input.seed,
        })
    }
}

async fn test_app(ready: bool, storage_dir: &std::path::Path) -> (Router, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));

    let engine = if ready {
        Arc::new(ModelEngine::new(
            Box::new(CountingPipeline { calls: calls.clone() }),
            "mock-edit-model",
        ))
    } else {
        Arc::new(ModelEngine::unready("mock-edit-model"))
    };

    let queue = Arc::new(SerialQueue::new(engine.clone()));
    queue.start().await;

    let mut settings = Settings::default();
    settings.storage.base_path = storage_dir.to_string_lossy().to_string();
    settings.storage.url_prefix = "http://localhost:8000/images".to_string();

    let state = Arc::new(AppState {
        settings: Arc::new(RwLock::new(settings)),
        engine,
        queue,
        responses: ResponseHandler::new(storage_dir, "http://localhost:8000/images"),
    });

    (routes::create_router(state).await, calls)
}

fn generation_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/images/generations")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn generate_returns_b64_payload() {
    let dir = tempfile::tempdir().unwrap();
    let (app, calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(
            r#"{"prompt": "red circle", "seed": 42, "response_format": "b64_json"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: ImageGenerationResponse = response_json(response).await;
    assert_eq!(body.data.len(), 1);

    let image = base64::decode(body.data[0].b64_json.as_ref().unwrap()).unwrap();
    assert_eq!(image, b"red circle#42".to_vec());
    assert_eq!(body.data[0].seed, Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generate_n_runs_sequential_single_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (app, calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(
            r#"{"prompt": "red circle", "n": 3, "seed": 7, "response_format": "b64_json"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: ImageGenerationResponse = response_json(response).await;
    assert_eq!(body.data.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn generate_url_format_stores_file() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(
            r#"{"prompt": "red circle", "seed": 1, "response_format": "url"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: ImageGenerationResponse = response_json(response).await;
    let url = body.data[0].url.as_ref().unwrap();
    assert!(url.starts_with("http://localhost:8000/images/"));

    let filename = url.rsplit('/').next().unwrap();
    assert!(dir.path().join(filename).exists());
}

#[tokio::test]
async fn generate_fails_fast_when_model_unready() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(false, dir.path()).await;

    let response = app
        .oneshot(generation_request(r#"{"prompt": "red circle"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn generate_rejects_empty_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(r#"{"prompt": "  "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_rejects_oversized_n() {
    let dir = tempfile::tempdir().unwrap();
    let (app, calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(r#"{"prompt": "red circle", "n": 99}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generate_rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(generation_request(r#"{"n": 1}"#))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn list_models_reports_loaded_model() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: ModelListResponse = response_json(response).await;
    assert_eq!(body.object, "list");
    assert_eq!(body.data.len(), 1);
    assert_eq!(body.data[0].id, "mock-edit-model");
}

#[tokio::test]
async fn health_reports_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _calls) = test_app(true, dir.path()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_ready"], true);
}
