//! Scripted renderer, extractor and sink shared by the harvest unit tests

use crate::config::{DelayRange, PacingConfig, RenderConfig};
use crate::extract::Extractor;
use crate::output::{OutputResult, ProfileRecord, ResultSink};
use crate::proxy::ProxyDescriptor;
use crate::render::{RenderError, RenderSession, RenderedPage, Renderer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted response for one render call; the last step repeats
#[derive(Debug, Clone)]
pub enum Step {
    Page(String, bool),
    Fail(RenderError),
    /// Sleeps before answering with the page
    Stall(Duration, String),
    Panic,
}

pub fn page(html: &str) -> Step {
    Step::Page(html.to_string(), true)
}

pub fn timeout() -> Step {
    Step::Fail(RenderError::Timeout { url: "scripted".into() })
}

/// Renderer whose sessions answer from a per-URL script
///
/// Unscripted URLs render as a page whose HTML is the URL's last path segment.
pub struct ScriptedRenderer {
    script: HashMap<String, Vec<Step>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    proxies_seen: Arc<Mutex<Vec<Option<String>>>>,
    fail_open: bool,
}

impl ScriptedRenderer {
    pub fn new(script: Vec<(&str, Vec<Step>)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(url, steps)| (url.to_string(), steps))
                .collect(),
            calls: Arc::new(Mutex::new(HashMap::new())),
            proxies_seen: Arc::new(Mutex::new(Vec::new())),
            fail_open: false,
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Proxy server of every opened session, `None` for direct sessions
    pub fn proxies_seen(&self) -> Vec<Option<String>> {
        self.proxies_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open(
        &self,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Box<dyn RenderSession>, RenderError> {
        self.proxies_seen
            .lock()
            .unwrap()
            .push(proxy.map(|p| p.server()));
        if self.fail_open {
            return Err(RenderError::Launch("scripted launch failure".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedSession {
    script: HashMap<String, Vec<Step>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn render(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let step = match self.script.get(url) {
            Some(steps) => steps[call.min(steps.len() - 1)].clone(),
            None => page(url.rsplit('/').next().unwrap_or(url)),
        };
        match step {
            Step::Page(html, content_found) => Ok(RenderedPage {
                html,
                content_found,
            }),
            Step::Fail(e) => Err(e),
            Step::Stall(delay, html) => {
                tokio::time::sleep(delay).await;
                Ok(RenderedPage {
                    html,
                    content_found: true,
                })
            }
            Step::Panic => panic!("scripted render panic for {}", url),
        }
    }
}

/// Copies the HTML into `followers`; HTML "broken" yields an error record
pub struct EchoExtractor;

impl Extractor for EchoExtractor {
    fn extract(&self, html: &str, url: &str) -> ProfileRecord {
        let mut record = ProfileRecord::new(url);
        if html == "broken" {
            record.push_error("parse defect");
        } else {
            record.followers = html.to_string();
        }
        record
    }
}

#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<ProfileRecord>>,
}

impl MemorySink {
    pub fn rows(&self) -> Vec<ProfileRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r.url).collect()
    }
}

impl ResultSink for MemorySink {
    fn append(&self, record: &ProfileRecord) -> OutputResult<()> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Render and pacing settings without any sleeping
pub fn zero_delay_configs() -> (RenderConfig, PacingConfig) {
    let render = RenderConfig {
        max_goto_attempts: 3,
        retry_base_delay_millis: 0,
        retry_jitter: DelayRange::zero(),
        ..RenderConfig::default()
    };
    let pacing = PacingConfig {
        direct: DelayRange::zero(),
        proxied: DelayRange::zero(),
    };
    (render, pacing)
}
