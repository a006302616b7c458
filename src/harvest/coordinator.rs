//! Run controller - drives a whole harvest run
//!
//! This module ties the pieces of a run together:
//! - Preparing the output directory, checkpoint and CSV file
//! - Resuming from the progress checkpoint
//! - Slicing the target list into fixed-size batches
//! - Running the batches strictly one after another
//! - Persisting the final progress

use super::scheduler::{plan_batch, BatchPlan, BatchReport, BatchScheduler};
use super::worker::{UnitWorker, WorkerReport};
use crate::config::Config;
use crate::extract::Extractor;
use crate::output::CsvSink;
use crate::proxy::ProxyPool;
use crate::render::Renderer;
use crate::storage::{load_targets, ProgressCheckpoint};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Checkpoint the run resumed from
    pub start_index: usize,

    /// Checkpoint the run finished at
    pub end_index: usize,

    pub total_targets: usize,
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    /// Rows appended to the CSV during this run
    pub fn written(&self) -> usize {
        self.batches.iter().map(BatchReport::written).sum()
    }

    /// Outcome totals over every worker of every batch
    pub fn totals(&self) -> WorkerReport {
        let mut totals = WorkerReport::default();
        for batch in &self.batches {
            totals.merge(&batch.pool);
            if let Some(supervisor) = &batch.supervisor {
                totals.merge(&supervisor.initial);
                totals.merge(&supervisor.retries);
            }
        }
        totals
    }

    /// True when there was nothing left to process
    pub fn was_noop(&self) -> bool {
        self.batches.is_empty()
    }
}

/// One-based batch number of the batch starting at `start`
pub fn batch_number(start: usize, batch_size: usize) -> usize {
    start / batch_size + 1
}

/// Number of batches needed to cover `total` targets
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size)
}

/// The batch a run would process next, for `--dry-run`
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub start: usize,
    pub end: usize,
    pub number: usize,
    pub total_batches: usize,
    pub total_targets: usize,
    pub proxies: usize,
    pub plan: BatchPlan,
}

/// Plans the first pending batch without rendering anything
///
/// # Returns
///
/// * `Ok(Some(PendingBatch))` - The next batch and its partition
/// * `Ok(None)` - The checkpoint is already at the end of the target list
/// * `Err(HarvestError)` - The target list cannot be read
pub fn plan_pending_batch(config: &Config) -> Result<Option<PendingBatch>, HarvestError> {
    let start = ProgressCheckpoint::new(config.output.progress_path()).load();
    let targets = load_targets(&config.input.targets_path)?;
    if start >= targets.len() {
        return Ok(None);
    }

    let batch_size = config.batch.batch_size;
    let end = (start + batch_size).min(targets.len());
    let proxies = ProxyPool::load(&config.input.proxies_path);
    let plan = plan_batch(end - start, &config.batch, &proxies);

    Ok(Some(PendingBatch {
        start,
        end,
        number: batch_number(start, batch_size),
        total_batches: batch_count(targets.len(), batch_size),
        total_targets: targets.len(),
        proxies: proxies.len(),
        plan,
    }))
}

/// Main run orchestration structure
pub struct RunController {
    config: Arc<Config>,
    renderer: Arc<dyn Renderer>,
    extractor: Arc<dyn Extractor>,
    fresh: bool,
}

impl RunController {
    pub fn new(config: Config, renderer: Arc<dyn Renderer>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            config: Arc::new(config),
            renderer,
            extractor,
            fresh: false,
        }
    }

    /// Ignore the checkpoint and truncate the CSV before running
    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Runs every pending batch
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - All pending batches were processed (possibly none)
    /// * `Err(HarvestError)` - The run could not start: the output directory,
    ///   target list or CSV file is unusable. Nothing has been rendered.
    pub async fn run(&self) -> Result<RunReport, HarvestError> {
        let started_at = Utc::now();
        let output_dir = &self.config.output.directory;
        std::fs::create_dir_all(output_dir).map_err(|source| HarvestError::OutputDirectory {
            path: output_dir.display().to_string(),
            source,
        })?;

        let checkpoint = ProgressCheckpoint::new(self.config.output.progress_path());
        if self.fresh {
            tracing::info!("Starting fresh run, ignoring previous progress");
            checkpoint.reset()?;
        }
        let start = checkpoint.load();

        let targets = load_targets(&self.config.input.targets_path)?;
        let total = targets.len();
        if start >= total {
            tracing::info!(
                "All {} targets already processed (checkpoint {}), nothing to do",
                total,
                start
            );
            if start > total {
                tracing::warn!(
                    "Checkpoint {} is past the end of the target list, resetting it to {}",
                    start,
                    total
                );
                if let Err(e) = checkpoint.save(total) {
                    tracing::error!("Failed to reset checkpoint: {}", e);
                }
            }
            return Ok(RunReport {
                started_at,
                finished_at: Utc::now(),
                start_index: start,
                end_index: total,
                total_targets: total,
                batches: Vec::new(),
            });
        }

        let csv_path = self.config.output.csv_path();
        let sink = Arc::new(CsvSink::initialize(&csv_path, start > 0)?);
        if start > 0 {
            tracing::info!("Resuming at target {} of {}, appending to {}", start, total, csv_path.display());
        } else {
            tracing::info!("Starting at the first of {} targets, writing {}", total, csv_path.display());
        }

        let proxies = Arc::new(ProxyPool::load(&self.config.input.proxies_path));
        let worker = UnitWorker::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.extractor),
            sink.clone(),
            &self.config.render,
            &self.config.pacing,
        );
        let scheduler = BatchScheduler::new(
            Arc::clone(&self.config),
            proxies,
            worker,
            checkpoint.clone(),
        );

        let batch_size = self.config.batch.batch_size;
        let total_batches = batch_count(total, batch_size);
        let mut batches = Vec::new();

        for batch_start in (start..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let number = batch_number(batch_start, batch_size);
            tracing::info!(
                batch = number,
                "Processing batch {}/{}: targets {}..{}",
                number,
                total_batches,
                batch_start,
                batch_end
            );

            let report = scheduler
                .run_batch(batch_start, &targets[batch_start..batch_end])
                .await;

            tracing::info!(
                batch = number,
                "Batch {}/{} done in {:.1}s: {} written ({} by pool, {} retried by supervisor)",
                number,
                total_batches,
                report.elapsed.as_secs_f64(),
                report.written(),
                report.pool.written,
                report.supervisor.map(|s| s.retried).unwrap_or(0)
            );
            batches.push(report);
        }

        if let Err(e) = checkpoint.save(total) {
            tracing::error!("Failed to save final checkpoint: {}", e);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            start_index: start,
            end_index: total,
            total_targets: total,
            batches,
        };
        tracing::info!(
            "Run finished: {} batches, {} rows written this run ({} total in {})",
            report.batches.len(),
            report.written(),
            sink.rows_written(),
            csv_path.display()
        );
        Ok(report)
    }
}
