//! HTTP renderer implementation
//!
//! Fetches the server-rendered HTML with reqwest. No scripts run, so the
//! content check only sees markup present in the initial response.

use super::{RenderError, RenderSession, RenderedPage, Renderer};
use crate::config::RenderConfig;
use crate::proxy::ProxyDescriptor;
use async_trait::async_trait;
use reqwest::{header, Client, Proxy};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

/// Renders pages with plain HTTP GET requests
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    user_agent: String,
    page_timeout: Duration,
    content_selectors: Arc<Vec<String>>,
}

impl HttpRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            page_timeout: config.page_timeout(),
            content_selectors: Arc::new(config.content_selectors.clone()),
        }
    }

    /// Builds an HTTP client, routed through `proxy` when given
    ///
    /// # Arguments
    ///
    /// * `proxy` - Optional proxy all requests go through
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Invalid proxy or TLS backend failure
    pub fn build_client(&self, proxy: Option<&ProxyDescriptor>) -> Result<Client, reqwest::Error> {
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

        let mut builder = Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(headers)
            .timeout(self.page_timeout)
            .connect_timeout(self.page_timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy.to_url())?);
        }

        builder.build()
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open(
        &self,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Box<dyn RenderSession>, RenderError> {
        let client = self
            .build_client(proxy)
            .map_err(|e| RenderError::Launch(format!("cannot build HTTP client: {}", e)))?;

        Ok(Box::new(HttpSession {
            client,
            proxied: proxy.is_some(),
            content_selectors: Arc::clone(&self.content_selectors),
        }))
    }
}

struct HttpSession {
    client: Client,
    proxied: bool,
    content_selectors: Arc<Vec<String>>,
}

#[async_trait]
impl RenderSession for HttpSession {
    async fn render(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| self.classify(url, e))?;
        let content_found = contains_any(&html, &self.content_selectors);

        Ok(RenderedPage {
            html,
            content_found,
        })
    }
}

impl HttpSession {
    fn classify(&self, url: &str, error: reqwest::Error) -> RenderError {
        let url = url.to_string();
        if error.is_timeout() {
            RenderError::Timeout { url }
        } else if error.is_connect() && self.proxied {
            RenderError::Proxy {
                url,
                message: error.to_string(),
            }
        } else if error.is_connect() || error.is_request() || error.is_body() {
            RenderError::Connection {
                url,
                message: error.to_string(),
            }
        } else {
            RenderError::Failed {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Whether any of `selectors` matches an element of `html`
///
/// With no selectors configured there is nothing to wait for, so the content
/// counts as found.
pub(crate) fn contains_any(html: &str, selectors: &[String]) -> bool {
    if selectors.is_empty() {
        return true;
    }
    let document = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .any(|selector| document.select(&selector).next().is_some())
}
