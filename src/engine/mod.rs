//! Compute resource owner - pipeline trait, engine, and the model runner bridge

pub mod model;
pub mod pipeline;
pub mod sidecar;

pub use model::ModelEngine;
pub use pipeline::{ImagePipeline, InferenceInput, InferenceOutput};
pub use sidecar::SidecarPipeline;
