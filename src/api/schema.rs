//! OpenAI-compatible request and response types for the images API

use serde::{Deserialize, Serialize};

/// Request body of `POST /v1/images/generations`.
///
/// Core OpenAI fields plus the image-edit extensions (`input_images`,
/// `true_cfg_scale`, ...). Omitted generation knobs fall back to the
/// configured defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationRequest {
    /// A text description of the desired image(s)
    pub prompt: String,

    /// Number of images to generate
    #[serde(default = "default_n")]
    pub n: u32,

    /// Requested size; accepted for contract compatibility, the edit
    /// pipeline derives dimensions from the reference images
    #[serde(default = "default_size")]
    pub size: String,

    /// "url" or "b64_json"
    #[serde(default)]
    pub response_format: Option<String>,

    /// Unique identifier for the end-user
    #[serde(default)]
    pub user: Option<String>,

    /// Base64 encoded reference images, raw or data-URL form
    #[serde(default)]
    pub input_images: Option<Vec<String>>,

    /// The prompt or prompts not to guide the generation
    #[serde(default)]
    pub negative_prompt: Option<String>,

    /// Guidance scale
    #[serde(default)]
    pub guidance_scale: Option<f32>,

    /// True CFG scale
    #[serde(default)]
    pub true_cfg_scale: Option<f32>,

    /// Number of denoising steps
    #[serde(default)]
    pub num_inference_steps: Option<u32>,

    /// Random seed for reproducible generation
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_n() -> u32 {
    1
}

fn default_size() -> String {
    "1024x1024".to_string()
}

/// One generated image entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,

    /// Seed actually used; extension field for reproducibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Response body of `POST /v1/images/generations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

/// Model description for `GET /v1/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// Response body of `GET /v1/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub object: String,
    pub data: Vec<ModelCard>,
}

/// Response body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_ready: bool,
    pub pending_jobs: u64,
    pub processed_jobs: u64,
}
