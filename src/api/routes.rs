//! Route wiring and request handlers

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::debug;

use crate::api::schema::{
    HealthResponse, ImageGenerationRequest, ImageGenerationResponse, ModelCard, ModelListResponse,
};
use crate::error::{AppError, Result};
use crate::middleware::{auth::AuthLayer, rate_limit::RateLimitLayer};
use crate::queue::Job;
use crate::response::ResponseFormat;
use crate::AppState;

/// Build the application router with middleware per configuration
pub async fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.read().await.clone();

    let mut app = Router::new()
        .route("/v1/images/generations", post(generate_images))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .nest_service("/images", ServeDir::new(&settings.storage.base_path))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.server.request_timeout_secs,
        )))
        .with_state(state);

    if settings.auth.enabled {
        app = app.layer(AuthLayer::new(settings.auth.api_keys.clone()));
    }

    if settings.rate_limit.enabled {
        app = app.layer(RateLimitLayer::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
        ));
    }

    app
}

/// `POST /v1/images/generations`
async fn generate_images(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImageGenerationRequest>,
) -> Result<Json<ImageGenerationResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("prompt must not be empty".to_string()));
    }

    let generation = state.settings.read().await.generation.clone();

    if request.n == 0 || request.n > generation.max_images {
        return Err(AppError::InvalidRequest(format!(
            "n must be between 1 and {}",
            generation.max_images
        )));
    }

    let job = Job {
        prompt: request.prompt,
        negative_prompt: request
            .negative_prompt
            .unwrap_or(generation.negative_prompt),
        reference_images: request.input_images.unwrap_or_default(),
        guidance_scale: request.guidance_scale.unwrap_or(generation.guidance_scale),
        true_cfg_scale: request.true_cfg_scale.unwrap_or(generation.true_cfg_scale),
        num_inference_steps: request
            .num_inference_steps
            .unwrap_or(generation.num_inference_steps),
        seed: request.seed.or(generation.seed),
    };

    let format = ResponseFormat::from_str(request.response_format.as_deref().unwrap_or("url"));

    debug!(n = request.n, references = job.reference_images.len(), "Accepted generation request");

    // The queue serves one image per job; n images are n sequential jobs
    let mut data = Vec::with_capacity(request.n as usize);
    for _ in 0..request.n {
        let output = state.queue.submit(job.clone()).await?;
        data.push(state.responses.render(&output, format).await?);
    }

    Ok(Json(ImageGenerationResponse {
        created: Utc::now().timestamp(),
        data,
    }))
}

/// `GET /v1/models`
async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        object: "list".to_string(),
        data: vec![ModelCard {
            id: state.engine.model_id().to_string(),
            object: "model".to_string(),
            created: Utc::now().timestamp(),
            owned_by: "qwen-image".to_string(),
        }],
    })
}

/// `GET /health` - liveness plus readiness and queue depth
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_ready: state.engine.is_ready(),
        pending_jobs: state.queue.pending_count(),
        processed_jobs: state.queue.processed_count(),
    })
}
