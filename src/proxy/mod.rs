//! Proxy handling for Profile-Harvest
//!
//! This module provides:
//! - Parsing of proxy strings into [`ProxyDescriptor`]s
//! - The read-only [`ProxyPool`] shared by all pool workers of a run
//! - Offline proxy qualification against a known-good page

mod descriptor;
mod validator;

pub use descriptor::{parse_proxy, ProxyCredentials, ProxyDescriptor, ProxyScheme};
pub use validator::{qualify_proxies, ProxyValidator, QualificationReport};

use crate::storage::read_list_file;
use std::path::Path;

/// The set of known-working proxies for a run
///
/// Loaded once and never mutated; workers receive clones of individual
/// descriptors.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyDescriptor>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyDescriptor>) -> Self {
        Self { proxies }
    }

    /// Loads proxies from a newline-delimited file
    ///
    /// Blank lines and `#` comments are skipped, malformed entries are dropped
    /// with a warning. A missing or unreadable file yields an empty pool: the
    /// run then proceeds with every pool worker on direct access.
    pub fn load(path: &Path) -> Self {
        match read_list_file(path) {
            Ok(lines) => {
                let pool = Self::from_lines(lines.iter().map(String::as_str));
                if pool.is_empty() {
                    tracing::warn!(
                        "Proxy file {} contains no usable proxies",
                        path.display()
                    );
                } else {
                    tracing::info!("Loaded {} proxies from {}", pool.len(), path.display());
                }
                pool
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Proxy file {} not found, running without proxies", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::error!("Failed to read proxy file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parses already-filtered proxy lines, dropping malformed ones
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut proxies = Vec::new();
        for line in lines {
            match parse_proxy(line) {
                Ok(proxy) => proxies.push(proxy),
                Err(e) => tracing::warn!("Skipping malformed proxy entry: {}", e),
            }
        }
        Self { proxies }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn as_slice(&self) -> &[ProxyDescriptor] {
        &self.proxies
    }

    /// Round-robin access: the proxy for the `index`-th proxied assignment
    pub fn cycle(&self, index: usize) -> Option<&ProxyDescriptor> {
        if self.proxies.is_empty() {
            None
        } else {
            self.proxies.get(index % self.proxies.len())
        }
    }
}
