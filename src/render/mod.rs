//! Page rendering for Profile-Harvest
//!
//! This module handles:
//! - The [`Renderer`] / [`RenderSession`] seam workers render through
//! - Classifying failures into retryable and terminal ones
//! - A plain HTTP renderer and, with the `browser` feature, a headless
//!   Chromium renderer
//!
//! A worker opens one session per chunk and renders its targets through it
//! one at a time. Failing to open a session is a resource-acquisition
//! failure: the worker requeues its whole chunk.

#[cfg(feature = "browser")]
mod browser;
mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use http::HttpRenderer;

use crate::config::{RenderConfig, RenderEngine};
use crate::proxy::ProxyDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while rendering a page
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Proxy failure for {url}: {message}")]
    Proxy { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to start renderer: {0}")]
    Launch(String),

    #[error("Render failed for {url}: {message}")]
    Failed { url: String, message: String },
}

impl RenderError {
    /// Whether another attempt at the same URL may succeed
    ///
    /// Timeouts, connection and proxy failures, rate limiting and server
    /// errors are retryable; everything else short-circuits.
    pub fn is_retryable(&self) -> bool {
        match self {
            RenderError::Timeout { .. }
            | RenderError::Connection { .. }
            | RenderError::Proxy { .. } => true,
            RenderError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            RenderError::Launch(_) | RenderError::Failed { .. } => false,
        }
    }
}

/// The outcome of a successful render
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,

    /// Whether any configured content selector appeared before the wait ran out
    pub content_found: bool,
}

/// Opens render sessions, optionally through a proxy
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquires the resources for one worker (HTTP client, browser process)
    async fn open(
        &self,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// A single worker's rendering context; renders one page at a time
#[async_trait]
pub trait RenderSession: Send {
    async fn render(&mut self, url: &str) -> Result<RenderedPage, RenderError>;

    /// Releases the session's resources
    async fn close(&mut self) {}
}

/// Builds the renderer selected by `config.engine`
pub fn build_renderer(config: &RenderConfig) -> Result<Arc<dyn Renderer>, RenderError> {
    match config.engine {
        RenderEngine::Http => Ok(Arc::new(HttpRenderer::new(config))),
        #[cfg(feature = "browser")]
        RenderEngine::Browser => Ok(Arc::new(BrowserRenderer::new(config))),
        #[cfg(not(feature = "browser"))]
        RenderEngine::Browser => Err(RenderError::Launch(
            "browser engine requested but this build lacks the `browser` feature".to_string(),
        )),
    }
}
