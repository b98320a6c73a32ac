//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    pub queue: QueueConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout imposed by the HTTP layer, not the queue
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    600
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    40
}

/// Storage configuration for generated images
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// Delete stored images older than this; disabled when absent
    #[serde(default)]
    pub retention_secs: Option<u64>,
}

fn default_storage_path() -> String {
    "./generated_images".to_string()
}

fn default_url_prefix() -> String {
    "http://localhost:8000/images".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Model runtime configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Model identifier reported by the API
    #[serde(default = "default_model_id")]
    pub id: String,
    /// Pretrained weights source handed to the runner
    #[serde(default = "default_model_source")]
    pub source: String,
    /// Runner executable
    #[serde(default = "default_runner_command")]
    pub command: String,
    /// Extra runner arguments, prepended to --model/--device
    #[serde(default)]
    pub args: Vec<String>,
    /// Execution device placement: "auto", "cuda", "cpu"
    #[serde(default = "default_device")]
    pub device: String,
    /// Forwarded to the runner environment when set
    #[serde(default)]
    pub hf_home: Option<String>,
    /// Continue serving (unready) when the model fails to load.
    /// Every submission fails with a not-ready error until restart.
    #[serde(default)]
    pub tolerate_load_failure: bool,
}

fn default_model_id() -> String {
    "Qwen/Qwen-Image-Edit-2509".to_string()
}

fn default_model_source() -> String {
    "Qwen/Qwen-Image-Edit-2509".to_string()
}

fn default_runner_command() -> String {
    "python3".to_string()
}

fn default_device() -> String {
    "auto".to_string()
}

/// Default generation parameters applied when a request omits them
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_true_cfg_scale")]
    pub true_cfg_scale: f32,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Upper bound on the `n` request field
    #[serde(default = "default_max_images")]
    pub max_images: u32,
}

fn default_negative_prompt() -> String {
    "blurry, low quality".to_string()
}

fn default_guidance_scale() -> f32 {
    7.5
}

fn default_true_cfg_scale() -> f32 {
    4.0
}

fn default_num_inference_steps() -> u32 {
    40
}

fn default_max_images() -> u32 {
    10
}

/// Request queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_max_queue_size() -> usize {
    256
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("auth.enabled", true)?
            .set_default("rate_limit.enabled", false)?
            .set_default("model.tolerate_load_failure", false)?
            .set_default("queue.max_queue_size", 256)?
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with IMAGE_EDIT_)
            .add_source(
                Environment::with_prefix("IMAGE_EDIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.model.command.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Model runner command cannot be empty".to_string(),
            )));
        }

        if self.generation.num_inference_steps == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "num_inference_steps must be at least 1".to_string(),
            )));
        }

        if self.generation.max_images == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "max_images must be at least 1".to_string(),
            )));
        }

        if self.queue.max_queue_size == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "max_queue_size must be at least 1".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
            },
            auth: AuthConfig {
                enabled: true,
                api_keys: vec![],
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            storage: StorageConfig {
                base_path: default_storage_path(),
                url_prefix: default_url_prefix(),
                retention_secs: None,
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            model: ModelConfig {
                id: default_model_id(),
                source: default_model_source(),
                command: default_runner_command(),
                args: vec![],
                device: default_device(),
                hf_home: None,
                tolerate_load_failure: false,
            },
            generation: GenerationConfig {
                negative_prompt: default_negative_prompt(),
                guidance_scale: default_guidance_scale(),
                true_cfg_scale: default_true_cfg_scale(),
                num_inference_steps: default_num_inference_steps(),
                seed: None,
                max_images: default_max_images(),
            },
            queue: QueueConfig {
                max_queue_size: default_max_queue_size(),
            },
        }
    }
}
