use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Overrides `batch.batch-size`
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";

/// Overrides `batch.desired-pool-workers`
pub const ENV_DESIRED_POOL_WORKERS: &str = "DESIRED_POOL_WORKERS";

/// Overrides `batch.pool-workers-without-proxy`
pub const ENV_POOL_WORKERS_WITHOUT_PROXY: &str = "NUM_POOL_WORKERS_SPECIFICALLY_WITHOUT_PROXY";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use profile_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Batch size: {}", config.batch.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;

    Ok(config)
}

/// Applies the batch-related environment overrides to a configuration
///
/// `lookup` resolves a variable name to its value; unset variables leave the
/// configured value untouched.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = read_usize(&lookup, ENV_BATCH_SIZE)? {
        config.batch.batch_size = value;
    }
    if let Some(value) = read_usize(&lookup, ENV_DESIRED_POOL_WORKERS)? {
        config.batch.desired_pool_workers = value;
    }
    if let Some(value) = read_usize(&lookup, ENV_POOL_WORKERS_WITHOUT_PROXY)? {
        config.batch.pool_workers_without_proxy = value;
    }
    Ok(())
}

fn read_usize<F>(lookup: &F, name: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be matched to the config that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
