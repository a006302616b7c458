use async_trait::async_trait;
use profile_harvest::config::{Config, DelayRange};
use profile_harvest::extract::Extractor;
use profile_harvest::proxy::ProxyDescriptor;
use profile_harvest::render::{RenderError, RenderSession, RenderedPage, Renderer};
use profile_harvest::ProfileRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn target(i: usize) -> String {
    format!("https://profiles.test/artist-{}", i)
}

/// Writes `count` targets and returns a config with every delay set to zero
pub fn create_test_config(dir: &Path, count: usize, batch_size: usize) -> Config {
    let targets_path = dir.join("targets.txt");
    let mut content = String::from("# test targets\n");
    for i in 0..count {
        content.push_str(&target(i));
        content.push('\n');
    }
    std::fs::write(&targets_path, content).unwrap();

    let mut config = Config::default();
    config.input.targets_path = targets_path;
    config.input.proxies_path = dir.join("working_proxies.txt");
    config.output.directory = dir.join("output_files");
    config.batch.batch_size = batch_size;
    config.batch.desired_pool_workers = 3;
    config.batch.pool_workers_without_proxy = 1;
    config.batch.cpu_count = Some(4);
    config.batch.retry_poll_millis = 10;
    config.batch.supervisor_grace_secs = 5;
    config.render.retry_base_delay_millis = 0;
    config.render.retry_jitter = DelayRange::zero();
    config.pacing.direct = DelayRange::zero();
    config.pacing.proxied = DelayRange::zero();
    config
}

/// How the fake renderer treats a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Every render times out
    AlwaysTimeout,
    /// The first render yields a page the extractor rejects
    FailFirstPass,
    /// Every render yields a page the extractor rejects
    AlwaysBroken,
}

#[derive(Default)]
struct Shared {
    calls: HashMap<String, usize>,
    /// Progress file content observed at each render, keyed by URL
    progress_seen: HashMap<String, Option<String>>,
}

/// Renderer that counts calls and records the progress file while rendering
#[derive(Clone)]
pub struct FakeRenderer {
    behaviors: Arc<HashMap<String, Behavior>>,
    progress_path: Option<PathBuf>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(HashMap::new()),
            progress_path: None,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn with_behavior(mut self, url: String, behavior: Behavior) -> Self {
        Arc::make_mut(&mut self.behaviors).insert(url, behavior);
        self
    }

    pub fn watching_progress(mut self, path: PathBuf) -> Self {
        self.progress_path = Some(path);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.shared.lock().unwrap().calls.get(url).copied().unwrap_or(0)
    }

    pub fn rendered(&self) -> HashSet<String> {
        self.shared.lock().unwrap().calls.keys().cloned().collect()
    }

    pub fn progress_seen(&self, url: &str) -> Option<String> {
        self.shared
            .lock()
            .unwrap()
            .progress_seen
            .get(url)
            .cloned()
            .flatten()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open(
        &self,
        _proxy: Option<&ProxyDescriptor>,
    ) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RenderSession for FakeRenderer {
    async fn render(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        let progress = self
            .progress_path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string());

        let call = {
            let mut shared = self.shared.lock().unwrap();
            shared.progress_seen.insert(url.to_string(), progress);
            let count = shared.calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let html = match self.behaviors.get(url) {
            Some(Behavior::AlwaysTimeout) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                })
            }
            Some(Behavior::FailFirstPass) if call == 1 => "broken".to_string(),
            Some(Behavior::AlwaysBroken) => "broken".to_string(),
            _ => format!("{}", url.len()),
        };
        Ok(RenderedPage {
            html,
            content_found: true,
        })
    }
}

/// Puts the HTML into `followers`; "broken" pages produce an error record
pub struct FakeExtractor;

impl Extractor for FakeExtractor {
    fn extract(&self, html: &str, url: &str) -> ProfileRecord {
        let mut record = ProfileRecord::new(url);
        if html == "broken" {
            record.push_error("no profile data");
        } else {
            record.followers = html.to_string();
        }
        record
    }
}

/// URLs of the data rows of a CSV file, in file order
pub fn csv_urls(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect()
}

pub fn header_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| line.starts_with("url,followers"))
        .count()
}
