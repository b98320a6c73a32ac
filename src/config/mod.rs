//! Configuration module

pub mod settings;

pub use settings::{
    AuthConfig, GenerationConfig, LoggingConfig, ModelConfig, QueueConfig, RateLimitConfig,
    ServerConfig, Settings, StorageConfig,
};
