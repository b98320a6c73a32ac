//! One generation request's parameters, queued for sequential execution

/// Immutable record of generation parameters for a single image.
///
/// Reference images stay in their portable base64 form here; the engine
/// decodes them on the worker thread.
#[derive(Debug, Clone)]
pub struct Job {
    pub prompt: String,
    pub negative_prompt: String,
    pub reference_images: Vec<String>,
    pub guidance_scale: f32,
    pub true_cfg_scale: f32,
    pub num_inference_steps: u32,
    pub seed: Option<u64>,
}
