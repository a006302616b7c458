//! Headless Chromium renderer (requires the `browser` feature)
//!
//! Each session owns its own browser process so the proxy can be set with
//! `--proxy-server` at launch. Pages are rendered one at a time in a single
//! tab: navigate, dismiss the cookie banner, wait for profile content, then
//! snapshot the DOM.

use super::{RenderError, RenderSession, RenderedPage, Renderer};
use crate::config::RenderConfig;
use crate::proxy::ProxyDescriptor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONTENT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const AFTER_COOKIE_CLICK_PAUSE: Duration = Duration::from_secs(1);

/// Launches one headless browser per worker
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    config: RenderConfig,
}

impl BrowserRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn launch(&self, proxy: Option<&ProxyDescriptor>) -> Result<BrowserSession> {
        let mut builder = BrowserConfig::builder().request_timeout(self.config.page_timeout());

        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = proxy {
            if proxy.credentials().is_some() {
                tracing::warn!(
                    "Chromium ignores proxy credentials on the command line; {} may reject requests",
                    proxy
                );
            }
            builder = builder.arg(format!("--proxy-server={}", proxy.server()));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;
        page.set_user_agent(self.config.user_agent.clone())
            .await
            .context("Failed to set user agent")?;

        Ok(BrowserSession {
            browser,
            handler_task,
            page,
            config: self.config.clone(),
        })
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    async fn open(
        &self,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Box<dyn RenderSession>, RenderError> {
        tracing::info!(
            "Launching browser (headless={}, proxy={})",
            self.config.headless,
            proxy.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
        );
        let session = self
            .launch(proxy)
            .await
            .map_err(|e| RenderError::Launch(format!("{:#}", e)))?;
        Ok(Box::new(session))
    }
}

struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    config: RenderConfig,
}

impl BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        match tokio::time::timeout(self.config.page_timeout(), self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(classify_navigation_error(url, &e.to_string())),
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    async fn dismiss_cookie_banner(&self, url: &str) {
        let selector = &self.config.cookie_button_selector;
        if selector.is_empty() {
            return;
        }

        let click = async {
            let button = self.page.find_element(selector.as_str()).await?;
            button.click().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.config.cookie_click_timeout(), click).await {
            Ok(Ok(())) => {
                tracing::debug!("[{}] Cookie banner dismissed", url);
                tokio::time::sleep(AFTER_COOKIE_CLICK_PAUSE).await;
            }
            _ => tracing::debug!(
                "[{}] No clickable cookie banner within {}s",
                url,
                self.config.cookie_click_timeout_secs
            ),
        }
    }

    /// Polls until any content selector is attached or the wait runs out
    async fn wait_for_content(&self) -> bool {
        if self.config.content_selectors.is_empty() {
            return true;
        }

        let poll = async {
            loop {
                for selector in &self.config.content_selectors {
                    if self.page.find_element(selector.as_str()).await.is_ok() {
                        return;
                    }
                }
                tokio::time::sleep(CONTENT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(self.config.content_timeout(), poll)
            .await
            .is_ok()
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn render(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        self.navigate(url).await?;
        self.dismiss_cookie_banner(url).await;

        let content_found = self.wait_for_content().await;
        if !content_found {
            tracing::warn!(
                "[{}] Content did not load within {}s",
                url,
                self.config.content_timeout_secs
            );
        }

        let html = self.page.content().await.map_err(|e| RenderError::Failed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(RenderedPage {
            html,
            content_found,
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Maps a Chromium navigation error onto the retry classification
fn classify_navigation_error(url: &str, message: &str) -> RenderError {
    let url = url.to_string();
    let message = message.to_string();
    if message.contains("ERR_PROXY") || message.contains("ERR_TUNNEL") || message.contains("ERR_SOCKS") {
        RenderError::Proxy { url, message }
    } else if message.contains("ERR_TIMED_OUT") {
        RenderError::Timeout { url }
    } else if message.contains("net::ERR_") {
        RenderError::Connection { url, message }
    } else {
        RenderError::Failed { url, message }
    }
}
