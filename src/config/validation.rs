use crate::config::types::{
    BatchConfig, Config, DelayRange, OutputConfig, PacingConfig, ProxyCheckConfig, RenderConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_batch_config(&config.batch)?;
    validate_render_config(&config.render)?;
    validate_pacing_config(&config.pacing)?;
    validate_output_config(&config.output)?;
    validate_proxy_check_config(&config.proxy_check)?;
    Ok(())
}

/// Validates batch partitioning settings
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    if !(config.direct_fraction > 0.0 && config.direct_fraction <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "direct-fraction must be in (0, 1], got {}",
            config.direct_fraction
        )));
    }

    if config.cpu_count == Some(0) {
        return Err(ConfigError::Validation(
            "cpu-count must be >= 1 when set".to_string(),
        ));
    }

    if config.retry_poll_millis == 0 {
        return Err(ConfigError::Validation(
            "retry-poll-millis must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates renderer settings
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.max_goto_attempts == 0 {
        return Err(ConfigError::Validation(
            "max-goto-attempts must be >= 1".to_string(),
        ));
    }

    if config.page_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "page-timeout-secs must be >= 1".to_string(),
        ));
    }

    validate_delay_range("render.retry-jitter", &config.retry_jitter)?;

    for selector in &config.content_selectors {
        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid content selector '{}'",
                selector
            )));
        }
    }

    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    validate_delay_range("pacing.direct", &config.direct)?;
    validate_delay_range("pacing.proxied", &config.proxied)
}

fn validate_delay_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if range.min_millis > range.max_millis {
        return Err(ConfigError::Validation(format!(
            "{}: min-millis ({}) exceeds max-millis ({})",
            name, range.min_millis, range.max_millis
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.csv_file.is_empty() {
        return Err(ConfigError::Validation(
            "csv-file cannot be empty".to_string(),
        ));
    }

    if config.progress_file.is_empty() {
        return Err(ConfigError::Validation(
            "progress-file cannot be empty".to_string(),
        ));
    }

    if config.csv_file == config.progress_file {
        return Err(ConfigError::Validation(
            "csv-file and progress-file must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxy_check_config(config: &ProxyCheckConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.check_url).map_err(|e| {
        ConfigError::Validation(format!("invalid check-url '{}': {}", config.check_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "check-url must be http(s), got '{}'",
            config.check_url
        )));
    }

    if config.concurrency == 0 {
        return Err(ConfigError::Validation(
            "proxy-check concurrency must be >= 1".to_string(),
        ));
    }

    Ok(())
}
