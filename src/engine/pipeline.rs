//! The pipeline trait - boundary to the loaded generative model

use crate::error::Result;

/// Fully resolved parameters for a single inference call.
///
/// Reference images are already decoded to raw encoded-image bytes and the
/// seed is always concrete by the time a pipeline sees it.
#[derive(Debug, Clone)]
pub struct InferenceInput {
    pub prompt: String,
    pub negative_prompt: String,
    pub reference_images: Vec<Vec<u8>>,
    pub guidance_scale: f32,
    pub true_cfg_scale: f32,
    pub num_inference_steps: u32,
    pub seed: u64,
}

/// One generated image, encoded (PNG unless the runner says otherwise)
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub image: Vec<u8>,
    pub seed: u64,
}

/// A loaded generative image-editing model.
///
/// `infer` is blocking and must only ever run on one thread at a time
/// against a given instance; `&mut self` encodes that. The serialization
/// queue guarantees a single caller, the worker.
pub trait ImagePipeline: Send {
    /// Identifier of the loaded model
    fn model_id(&self) -> &str;

    /// Run one generation. Blocks for the full inference duration.
    fn infer(&mut self, input: InferenceInput) -> Result<InferenceOutput>;
}
