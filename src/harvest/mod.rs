//! Harvest module: batch orchestration
//!
//! This module contains the core processing logic, including:
//! - The unit worker that renders, extracts and dispatches targets
//! - The per-batch retry channel and the direct supervisor consuming it
//! - Batch partitioning and scheduling
//! - Run control with checkpoint-based resumption

mod coordinator;
mod retry;
mod scheduler;
mod supervisor;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{
    batch_count, batch_number, plan_pending_batch, PendingBatch, RunController, RunReport,
};
pub use retry::{
    retry_channel, RetryLeftovers, RetryMessage, RetryPoll, RetryReceiver, RetrySender,
};
pub use scheduler::{plan_batch, BatchPlan, BatchReport, BatchScheduler, ChunkPlan};
pub use supervisor::{DirectSupervisor, SupervisorReport};
pub use worker::{UnitWorker, WorkChunk, WorkerReport, CONTENT_NOT_FOUND};

use crate::config::Config;
use crate::extract::ProfileExtractor;
use crate::render::build_renderer;
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete harvest with the configured renderer
///
/// This is the main entry point for a run. It will:
/// 1. Build the renderer selected by `render.engine`
/// 2. Resume from the progress checkpoint (or start over when `fresh`)
/// 3. Process every pending batch
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `fresh` - Ignore previous progress and truncate the CSV
///
/// # Returns
///
/// * `Ok(RunReport)` - The run completed
/// * `Err(HarvestError)` - The run could not start
pub async fn harvest(config: Config, fresh: bool) -> Result<RunReport, HarvestError> {
    let renderer = build_renderer(&config.render)?;
    RunController::new(config, renderer, Arc::new(ProfileExtractor::new()))
        .with_fresh(fresh)
        .run()
        .await
}
