//! Image Edit Server
//!
//! Serves a local generative image-editing model behind an OpenAI-compatible
//! HTTP API. Concurrent requests are funneled through a single-consumer
//! queue so the non-reentrant model pipeline only ever runs one inference
//! at a time.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod queue;
pub mod response;

pub use error::{AppError, Result};

use std::sync::Arc;
use tokio::sync::RwLock;

use engine::ModelEngine;
use queue::SerialQueue;
use response::ResponseHandler;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub engine: Arc<ModelEngine>,
    pub queue: Arc<SerialQueue>,
    pub responses: ResponseHandler,
}
