use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Profile-Harvest
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
    pub render: RenderConfig,
    pub pacing: PacingConfig,
    #[serde(rename = "proxy-check")]
    pub proxy_check: ProxyCheckConfig,
}

/// Input file locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputConfig {
    /// Newline-delimited list of profile URLs
    pub targets_path: PathBuf,

    /// Newline-delimited list of known-working proxies
    pub proxies_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            targets_path: PathBuf::from("users.txt"),
            proxies_path: PathBuf::from("working_proxies.txt"),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding the CSV and progress files
    pub directory: PathBuf,

    /// CSV file name, relative to `directory`
    pub csv_file: String,

    /// Progress checkpoint file name, relative to `directory`
    pub progress_file: String,
}

impl OutputConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.directory.join(&self.csv_file)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.directory.join(&self.progress_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output_files"),
            csv_file: "profiles_batched.csv".to_string(),
            progress_file: "processing_progress.txt".to_string(),
        }
    }
}

/// Batch partitioning and worker allocation
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BatchConfig {
    /// Number of targets per batch
    pub batch_size: usize,

    /// Upper bound on pool workers per batch
    pub desired_pool_workers: usize,

    /// Number of leading pool chunks that never get a proxy
    pub pool_workers_without_proxy: usize,

    /// Share of each batch handed to the direct supervisor up front
    pub direct_fraction: f64,

    /// Overrides the detected CPU count (pool size is capped at cpu - 1)
    pub cpu_count: Option<usize>,

    /// How long the direct supervisor may take to exit after the stop signal
    pub supervisor_grace_secs: u64,

    /// Poll timeout for the retry channel
    pub retry_poll_millis: u64,
}

impl BatchConfig {
    /// CPU count used for capping the pool: the override, or what the OS reports
    pub fn effective_cpu_count(&self) -> usize {
        self.cpu_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn supervisor_grace(&self) -> Duration {
        Duration::from_secs(self.supervisor_grace_secs)
    }

    pub fn retry_poll(&self) -> Duration {
        Duration::from_millis(self.retry_poll_millis)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            desired_pool_workers: 19,
            pool_workers_without_proxy: 4,
            direct_fraction: 1.0 / 3.0,
            cpu_count: None,
            supervisor_grace_secs: 180,
            retry_poll_millis: 1000,
        }
    }
}

/// Which renderer backs the workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Plain HTTP fetch through reqwest
    #[default]
    Http,
    /// Headless Chromium (requires the `browser` feature)
    Browser,
}

/// Page rendering configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderConfig {
    pub engine: RenderEngine,

    /// Run the browser without a window
    pub headless: bool,

    /// Hard per-navigation timeout
    pub page_timeout_secs: u64,

    /// How long to look for the cookie dialog button
    pub cookie_click_timeout_secs: u64,

    /// How long to wait for any of the content selectors
    pub content_timeout_secs: u64,

    /// Navigation attempts per target before giving up
    pub max_goto_attempts: u32,

    /// Backoff base; attempt `n` waits `base * 2^n` plus jitter
    pub retry_base_delay_millis: u64,

    /// Jitter added to every backoff delay
    pub retry_jitter: DelayRange,

    pub user_agent: String,

    pub cookie_button_selector: String,

    /// Any one of these appearing means the profile content has loaded
    pub content_selectors: Vec<String>,
}

impl RenderConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn cookie_click_timeout(&self) -> Duration {
        Duration::from_secs(self.cookie_click_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: RenderEngine::Http,
            headless: true,
            page_timeout_secs: 180,
            cookie_click_timeout_secs: 10,
            content_timeout_secs: 15,
            max_goto_attempts: 3,
            retry_base_delay_millis: 3000,
            retry_jitter: DelayRange::new(500, 1500),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36"
                .to_string(),
            cookie_button_selector: "#onetrust-accept-btn-handler".to_string(),
            content_selectors: vec![
                "div.web-profiles".to_string(),
                "div.biographyText".to_string(),
                "div.truncatedUserDescription".to_string(),
                "a[href$='/followers']".to_string(),
            ],
        }
    }
}

/// Pauses inserted between targets within one chunk
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause range for workers without a proxy
    pub direct: DelayRange,

    /// Pause range for proxied workers
    pub proxied: DelayRange,
}

impl PacingConfig {
    pub fn for_worker(&self, proxied: bool) -> &DelayRange {
        if proxied {
            &self.proxied
        } else {
            &self.direct
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            direct: DelayRange::new(500, 1500),
            proxied: DelayRange::new(1000, 3000),
        }
    }
}

/// An inclusive range of milliseconds to sample a random delay from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DelayRange {
    pub min_millis: u64,
    pub max_millis: u64,
}

impl DelayRange {
    pub const fn new(min_millis: u64, max_millis: u64) -> Self {
        Self {
            min_millis,
            max_millis,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Picks a uniformly random duration inside the range
    pub fn sample(&self) -> Duration {
        if self.max_millis <= self.min_millis {
            return Duration::from_millis(self.min_millis);
        }
        let millis = rand::thread_rng().gen_range(self.min_millis..=self.max_millis);
        Duration::from_millis(millis)
    }
}

/// Offline proxy qualification settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyCheckConfig {
    /// Unvalidated proxy list
    pub raw_path: PathBuf,

    /// Where working proxies are written
    pub output_path: PathBuf,

    /// Known-good page every proxy must be able to reach
    pub check_url: String,

    pub timeout_secs: u64,

    /// Number of proxies checked at once
    pub concurrency: usize,
}

impl Default for ProxyCheckConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("only_proxy2.txt"),
            output_path: PathBuf::from("working_proxies.txt"),
            check_url: "https://soundcloud.com/martingarrix/".to_string(),
            timeout_secs: 10,
            concurrency: 50,
        }
    }
}
