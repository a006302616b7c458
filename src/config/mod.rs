//! Configuration module for Profile-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A handful of batch settings can also be overridden from the environment;
//! overrides are applied once at load time and the resulting [`Config`] is
//! never mutated afterwards.
//!
//! # Example
//!
//! ```no_run
//! use profile_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Batch size: {}", config.batch.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, Config, DelayRange, InputConfig, OutputConfig, PacingConfig, ProxyCheckConfig,
    RenderConfig, RenderEngine,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    ENV_BATCH_SIZE, ENV_DESIRED_POOL_WORKERS, ENV_POOL_WORKERS_WITHOUT_PROXY,
};
pub use validation::validate;
