//! Model engine - owns the loaded pipeline and prepares jobs for it

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::engine::pipeline::{ImagePipeline, InferenceInput, InferenceOutput};
use crate::engine::sidecar::SidecarPipeline;
use crate::error::{AppError, Result};
use crate::queue::job::Job;
use crate::response::base64;

/// Owner of the loaded model state.
///
/// Constructed once at the composition point and passed by `Arc` into the
/// serialization queue; the queue's worker is the only caller of `infer`.
pub struct ModelEngine {
    model_id: String,
    pipeline: Mutex<Option<Box<dyn ImagePipeline>>>,
    ready: AtomicBool,
}

impl ModelEngine {
    /// Wrap an already constructed pipeline
    pub fn new(pipeline: Box<dyn ImagePipeline>, model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            pipeline: Mutex::new(Some(pipeline)),
            ready: AtomicBool::new(true),
        }
    }

    /// An engine with no loaded model. Every `infer` fails until restart.
    pub fn unready(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            pipeline: Mutex::new(None),
            ready: AtomicBool::new(false),
        }
    }

    /// Spawn the configured model runner and wait for its ready handshake.
    ///
    /// Blocking; call from `spawn_blocking` in async contexts.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        info!(model = %config.source, device = %config.device, "Loading model");
        let pipeline = SidecarPipeline::spawn(config)?;
        let model_id = if config.id.is_empty() {
            pipeline.model_id().to_string()
        } else {
            config.id.clone()
        };
        info!(model = %model_id, "Model loaded");
        Ok(Self::new(Box::new(pipeline), model_id))
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Run one job against the loaded pipeline. Blocking.
    ///
    /// The queue worker is the sole caller; the mutex is uncontended by
    /// construction and exists to satisfy aliasing rules on the shared
    /// handle.
    pub fn infer(&self, job: &Job) -> Result<InferenceOutput> {
        let input = self.prepare(job)?;
        let mut slot = self.pipeline.lock();
        let pipeline = slot.as_mut().ok_or(AppError::NotReady)?;
        debug!(seed = input.seed, steps = input.num_inference_steps, "Running inference");
        pipeline.infer(input)
    }

    /// Decode reference images and fill in a seed when the job has none
    fn prepare(&self, job: &Job) -> Result<InferenceInput> {
        let mut reference_images = Vec::with_capacity(job.reference_images.len());
        for encoded in &job.reference_images {
            reference_images.push(base64::decode(encoded)?);
        }

        let seed = job.seed.unwrap_or_else(rand::random);

        Ok(InferenceInput {
            prompt: job.prompt.clone(),
            negative_prompt: job.negative_prompt.clone(),
            reference_images,
            guidance_scale: job.guidance_scale,
            true_cfg_scale: job.true_cfg_scale,
            num_inference_steps: job.num_inference_steps,
            seed,
        })
    }
}
