//! Offline proxy qualification
//!
//! Checks raw proxies against a known-good page and writes the working ones to
//! the file the harvest run later loads into its [`ProxyPool`](super::ProxyPool).
//! Nothing here runs during a harvest.

use crate::config::ProxyCheckConfig;
use crate::proxy::{parse_proxy, ProxyDescriptor};
use crate::storage::read_list_file;
use crate::HarvestError;
use futures::stream::{self, StreamExt};
use reqwest::{header, Client, Proxy};
use std::path::Path;
use std::time::{Duration, Instant};

const CHECK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                (KHTML, like Gecko) Chrome/100.0.4430.93 Safari/537.36 ProxyChecker";

/// Checks whether a proxy can reach a target page within a timeout
#[derive(Debug, Clone)]
pub struct ProxyValidator {
    target_url: String,
    timeout: Duration,
}

impl ProxyValidator {
    pub fn new(target_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target_url: target_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProxyCheckConfig) -> Self {
        Self::new(config.check_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Returns true when a GET through `proxy` yields a 2xx response
    ///
    /// Timeouts, proxy failures and error statuses all count as "not working"
    /// and are not logged above debug level.
    pub async fn validate(&self, proxy: &ProxyDescriptor) -> bool {
        let client = match self.build_client(proxy) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Cannot build client for proxy {}: {}", proxy, e);
                return false;
            }
        };

        let started = Instant::now();
        let result = client
            .get(&self.target_url)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(response) => {
                tracing::info!(
                    "Working proxy {} (status {}, {:.2}s)",
                    proxy,
                    response.status().as_u16(),
                    started.elapsed().as_secs_f64()
                );
                true
            }
            Err(e) => {
                tracing::debug!("Proxy {} failed: {}", proxy, e);
                false
            }
        }
    }

    /// Parses and validates a raw proxy line; unparsable lines are not working
    pub async fn validate_raw(&self, raw: &str) -> bool {
        match parse_proxy(raw) {
            Ok(proxy) => self.validate(&proxy).await,
            Err(e) => {
                tracing::debug!("Unparsable proxy '{}': {}", raw, e);
                false
            }
        }
    }

    fn build_client(&self, proxy: &ProxyDescriptor) -> Result<Client, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        Client::builder()
            .proxy(Proxy::all(proxy.to_url())?)
            .user_agent(CHECK_USER_AGENT)
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
    }
}

/// Outcome of a qualification pass
#[derive(Debug, Clone)]
pub struct QualificationReport {
    /// Number of raw entries checked
    pub checked: usize,

    /// Working entries, sorted, exactly as they appeared in the raw file
    pub working: Vec<String>,

    pub elapsed: Duration,
}

impl QualificationReport {
    pub fn failed(&self) -> usize {
        self.checked - self.working.len()
    }
}

/// Validates every proxy in `config.raw_path` and writes the working ones
///
/// At most `config.concurrency` checks run at once. When nothing works, a
/// stale output file from a previous pass is removed so the harvest does not
/// pick up dead proxies.
pub async fn qualify_proxies(config: &ProxyCheckConfig) -> Result<QualificationReport, HarvestError> {
    let raw = match read_list_file(&config.raw_path) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(
                "Cannot read raw proxy file {}: {}",
                config.raw_path.display(),
                e
            );
            Vec::new()
        }
    };
    tracing::info!(
        "Checking {} proxies against {} (timeout {}s, {} at a time)",
        raw.len(),
        config.check_url,
        config.timeout_secs,
        config.concurrency
    );

    let validator = ProxyValidator::from_config(config);
    let started = Instant::now();

    let mut working: Vec<String> = stream::iter(raw.iter().cloned())
        .map(|line| {
            let validator = validator.clone();
            async move {
                let ok = validator.validate_raw(&line).await;
                (line, ok)
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .filter_map(|(line, ok)| async move { ok.then_some(line) })
        .collect()
        .await;
    working.sort();

    write_working_proxies(&config.output_path, &working)?;

    Ok(QualificationReport {
        checked: raw.len(),
        working,
        elapsed: started.elapsed(),
    })
}

fn write_working_proxies(path: &Path, working: &[String]) -> Result<(), HarvestError> {
    if working.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::info!("No working proxies; removed stale {}", path.display());
        }
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = working.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    tracing::info!("Saved {} working proxies to {}", working.len(), path.display());
    Ok(())
}
