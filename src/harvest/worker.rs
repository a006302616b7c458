//! Unit worker: renders and extracts one chunk of targets
//!
//! Each target is rendered (with bounded retries for retryable failures),
//! extracted into a [`ProfileRecord`] and dispatched:
//! - empty error: appended to the sink
//! - error and a retry channel: requeued for the direct supervisor
//! - error and no retry channel: dropped with a log entry

use super::retry::RetrySender;
use crate::config::{DelayRange, PacingConfig, RenderConfig};
use crate::extract::Extractor;
use crate::output::{ProfileRecord, ResultSink};
use crate::proxy::ProxyDescriptor;
use crate::render::{RenderSession, Renderer};
use crate::state::TargetOutcome;
use crate::storage::Target;
use std::sync::Arc;
use std::time::Duration;

/// Error recorded when the page loaded but no profile content appeared
pub const CONTENT_NOT_FOUND: &str = "content selectors not found";

/// A contiguous slice of a batch assigned to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkChunk {
    pub targets: Vec<Target>,
    pub proxy: Option<ProxyDescriptor>,
}

impl WorkChunk {
    pub fn new(targets: Vec<Target>, proxy: Option<ProxyDescriptor>) -> Self {
        Self { targets, proxy }
    }

    /// A chunk rendered without a proxy
    pub fn direct(targets: Vec<Target>) -> Self {
        Self::new(targets, None)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Per-worker tally of target outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub written: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub sink_failures: usize,
}

impl WorkerReport {
    pub fn record(&mut self, outcome: TargetOutcome) {
        match outcome {
            TargetOutcome::Written => self.written += 1,
            TargetOutcome::Requeued => self.requeued += 1,
            TargetOutcome::Dropped => self.dropped += 1,
            TargetOutcome::SinkFailed => self.sink_failures += 1,
        }
    }

    pub fn merge(&mut self, other: &WorkerReport) {
        self.written += other.written;
        self.requeued += other.requeued;
        self.dropped += other.dropped;
        self.sink_failures += other.sink_failures;
    }

    /// Number of targets this report accounts for
    pub fn total(&self) -> usize {
        self.written + self.requeued + self.dropped + self.sink_failures
    }
}

/// Render retry settings derived from [`RenderConfig`]
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: DelayRange,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base * 2^attempt + jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor) + self.jitter.sample()
    }
}

/// Processes chunks of targets through a renderer, an extractor and a sink
#[derive(Clone)]
pub struct UnitWorker {
    renderer: Arc<dyn Renderer>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn ResultSink>,
    policy: RetryPolicy,
    pacing: PacingConfig,
}

impl UnitWorker {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn ResultSink>,
        render: &RenderConfig,
        pacing: &PacingConfig,
    ) -> Self {
        Self {
            renderer,
            extractor,
            sink,
            policy: RetryPolicy {
                max_attempts: render.max_goto_attempts.max(1),
                base_delay: Duration::from_millis(render.retry_base_delay_millis),
                jitter: render.retry_jitter,
            },
            pacing: pacing.clone(),
        }
    }

    /// Processes every target of `chunk` sequentially
    ///
    /// # Arguments
    ///
    /// * `label` - Worker name used in log lines
    /// * `chunk` - Targets and the proxy to render them through
    /// * `retry` - Where failed targets go; `None` means failures are dropped
    ///
    /// # Returns
    ///
    /// A report whose `written` count is the worker's success count. When the
    /// render session cannot be opened, the whole chunk is requeued (or
    /// dropped without a channel) and nothing is written.
    pub async fn run(
        &self,
        label: &str,
        chunk: &WorkChunk,
        retry: Option<&RetrySender>,
    ) -> WorkerReport {
        let mut report = WorkerReport::default();
        if chunk.is_empty() {
            return report;
        }

        let proxied = chunk.proxy.is_some();
        tracing::info!(
            worker = %label,
            "Starting {} targets ({})",
            chunk.len(),
            chunk
                .proxy
                .as_ref()
                .map(|p| format!("proxy {}", p))
                .unwrap_or_else(|| "no proxy".to_string())
        );

        let mut session = match self.renderer.open(chunk.proxy.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(worker = %label, "Cannot start renderer: {}", e);
                for target in &chunk.targets {
                    report.record(self.forward_failure(label, target, &e.to_string(), retry));
                }
                return report;
            }
        };

        let pause = self.pacing.for_worker(proxied);
        for (i, target) in chunk.targets.iter().enumerate() {
            tracing::info!(
                worker = %label,
                "Target {}/{}: {}",
                i + 1,
                chunk.len(),
                target
            );

            let record = self.process_target(label, session.as_mut(), target).await;
            report.record(self.dispatch(label, record, retry));

            if i + 1 < chunk.len() {
                tokio::time::sleep(pause.sample()).await;
            }
        }

        session.close().await;
        tracing::info!(
            worker = %label,
            "Chunk of {} finished: {} written, {} requeued, {} dropped",
            chunk.len(),
            report.written,
            report.requeued,
            report.dropped + report.sink_failures
        );
        report
    }

    /// Renders one target with bounded retries and extracts its record
    async fn process_target(
        &self,
        label: &str,
        session: &mut dyn RenderSession,
        target: &str,
    ) -> ProfileRecord {
        let mut attempt = 0;
        loop {
            match session.render(target).await {
                Ok(page) => {
                    let mut record = self.extractor.extract(&page.html, target);
                    if !page.content_found {
                        record.push_error(CONTENT_NOT_FOUND);
                    }
                    return record;
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        worker = %label,
                        "Attempt {}/{} for {} failed: {}. Retrying in {:.2}s",
                        attempt + 1,
                        self.policy.max_attempts,
                        target,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        worker = %label,
                        "Giving up on {} after {} attempt(s): {}",
                        target,
                        attempt + 1,
                        e
                    );
                    return ProfileRecord::failed(target, e.to_string());
                }
            }
        }
    }

    fn dispatch(&self, label: &str, record: ProfileRecord, retry: Option<&RetrySender>) -> TargetOutcome {
        if record.is_success() {
            return match self.sink.append(&record) {
                Ok(()) => {
                    tracing::debug!(
                        worker = %label,
                        "Wrote {} (followers '{}')",
                        record.url,
                        record.followers
                    );
                    TargetOutcome::Written
                }
                Err(e) => {
                    tracing::error!(worker = %label, "Failed to write {}: {}", record.url, e);
                    TargetOutcome::SinkFailed
                }
            };
        }

        self.forward_failure(label, &record.url, &record.error, retry)
    }

    fn forward_failure(
        &self,
        label: &str,
        target: &str,
        error: &str,
        retry: Option<&RetrySender>,
    ) -> TargetOutcome {
        match retry {
            Some(channel) => {
                if channel.push(target.to_string()) {
                    tracing::info!(worker = %label, "Requeued {}: {}", target, error);
                    TargetOutcome::Requeued
                } else {
                    TargetOutcome::Dropped
                }
            }
            None => {
                tracing::warn!(
                    worker = %label,
                    "Dropping {} (no retry channel): {}",
                    target,
                    error
                );
                TargetOutcome::Dropped
            }
        }
    }
}
