//! Profile-Harvest: a resumable, proxy-aware profile page harvester
//!
//! This crate renders public profile pages, extracts follower counts, social
//! links and emails from them, and appends the results to a CSV file. Work is
//! processed in fixed-size batches; each batch is split between one long-lived
//! direct worker and a pool of (optionally proxied) workers, and the progress
//! checkpoint only advances once a batch has fully drained.

pub mod config;
pub mod extract;
pub mod harvest;
pub mod output;
pub mod proxy;
pub mod render;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Profile-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] storage::CheckpointError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDirectory {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot read target list {path}: {source}")]
    Targets {
        path: String,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid value for environment variable {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

/// Proxy-string parsing errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to parse proxy '{0}'")]
    Parse(String),

    #[error("Proxy '{0}' has no host")]
    MissingHost(String),

    #[error("Proxy '{0}' has no port")]
    MissingPort(String),

    #[error("Unsupported proxy scheme '{scheme}' in '{proxy}'")]
    UnsupportedScheme { proxy: String, scheme: String },
}

/// Result type alias for Profile-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for proxy parsing
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{BatchScheduler, RunController, RunReport};
pub use output::ProfileRecord;
pub use proxy::{ProxyDescriptor, ProxyPool};
pub use state::{SupervisorState, TargetOutcome};
