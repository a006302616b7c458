//! Batch scheduler - partitions one batch and runs it to completion
//!
//! A batch is split into a leading direct slice, handed to the
//! [`DirectSupervisor`], and a remainder divided into contiguous chunks for
//! the pool workers. Pool workers forward failures to the supervisor over the
//! batch's retry channel. The checkpoint is written only once every worker has
//! returned and the supervisor has stopped (or been aborted).

use super::retry::retry_channel;
use super::supervisor::{DirectSupervisor, SupervisorReport};
use super::worker::{UnitWorker, WorkChunk, WorkerReport};
use crate::config::{BatchConfig, Config};
use crate::proxy::{ProxyDescriptor, ProxyPool};
use crate::storage::{ProgressCheckpoint, Target};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// One pool worker's share of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Indices into the batch
    pub range: Range<usize>,
    pub proxy: Option<ProxyDescriptor>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// How a batch of `n` targets is divided between the workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Indices handed to the direct supervisor's initial slice
    pub direct: Range<usize>,

    /// Pool worker chunks, in batch order
    pub chunks: Vec<ChunkPlan>,
}

impl BatchPlan {
    /// The supervisor runs whenever it has its own work or may receive retries
    pub fn launches_supervisor(&self) -> bool {
        !self.direct.is_empty() || !self.chunks.is_empty()
    }

    pub fn proxied_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.proxy.is_some()).count()
    }

    /// Total number of targets covered by the plan
    pub fn covered(&self) -> usize {
        self.direct.len() + self.chunks.iter().map(ChunkPlan::len).sum::<usize>()
    }
}

/// Computes the partition of a batch of `n` targets
///
/// # Arguments
///
/// * `n` - Number of targets in the batch
/// * `config` - Batch settings (direct fraction, worker limits, CPU override)
/// * `proxies` - The run's proxy pool, assigned round-robin to proxied chunks
///
/// # Returns
///
/// A plan whose direct slice and chunks are contiguous, disjoint and together
/// cover `0..n`. The pool size is `min(desired, cpu - 1, remainder)`; when it
/// comes out as zero the whole batch goes to the direct slice. Chunks are
/// `remainder / pool` long with the last one absorbing the leftover. The first
/// `pool_workers_without_proxy` chunks never get a proxy.
pub fn plan_batch(n: usize, config: &BatchConfig, proxies: &ProxyPool) -> BatchPlan {
    let direct_len = (((n as f64) * config.direct_fraction) - 1e-9)
        .ceil()
        .max(0.0) as usize;
    let direct_len = direct_len.min(n);
    let remainder = n - direct_len;

    let pool_size = config
        .desired_pool_workers
        .min(config.effective_cpu_count().saturating_sub(1))
        .min(remainder);

    if pool_size == 0 {
        return BatchPlan {
            direct: 0..n,
            chunks: Vec::new(),
        };
    }

    let chunk_len = remainder / pool_size;
    let mut chunks = Vec::with_capacity(pool_size);
    for i in 0..pool_size {
        let start = direct_len + i * chunk_len;
        let end = if i + 1 == pool_size { n } else { start + chunk_len };
        let proxy = if i < config.pool_workers_without_proxy {
            None
        } else {
            proxies
                .cycle(i - config.pool_workers_without_proxy)
                .cloned()
        };
        chunks.push(ChunkPlan {
            range: start..end,
            proxy,
        });
    }

    BatchPlan {
        direct: 0..direct_len,
        chunks,
    }
}

/// What happened during one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Absolute index of the first target
    pub start: usize,

    /// Absolute index one past the last target
    pub end: usize,

    pub direct_targets: usize,
    pub pool_workers: usize,
    pub proxied_workers: usize,

    /// Combined outcomes of every pool worker that returned
    pub pool: WorkerReport,

    /// `None` when the supervisor was not launched or did not finish in time
    pub supervisor: Option<SupervisorReport>,

    /// The supervisor missed its grace period and was aborted
    pub supervisor_aborted: bool,

    /// Requeued targets the supervisor never picked up before it was aborted
    pub unretried: usize,

    pub checkpoint_saved: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Rows appended to the sink during this batch
    pub fn written(&self) -> usize {
        let supervisor = self
            .supervisor
            .map(|s| s.initial.written + s.retries.written)
            .unwrap_or(0);
        self.pool.written + supervisor
    }
}

/// Runs batches: partition, launch, await, stop the supervisor, checkpoint
pub struct BatchScheduler {
    config: Arc<Config>,
    proxies: Arc<ProxyPool>,
    worker: UnitWorker,
    checkpoint: ProgressCheckpoint,
}

impl BatchScheduler {
    pub fn new(
        config: Arc<Config>,
        proxies: Arc<ProxyPool>,
        worker: UnitWorker,
        checkpoint: ProgressCheckpoint,
    ) -> Self {
        Self {
            config,
            proxies,
            worker,
            checkpoint,
        }
    }

    /// Partition of a batch of `n` targets under this scheduler's settings
    pub fn plan(&self, n: usize) -> BatchPlan {
        plan_batch(n, &self.config.batch, &self.proxies)
    }

    /// Processes one batch and advances the checkpoint past it
    ///
    /// # Arguments
    ///
    /// * `batch_start` - Absolute index of `batch[0]` in the target list
    /// * `batch` - The targets of this batch
    ///
    /// # Returns
    ///
    /// A report of the batch. Worker panics and a supervisor that overruns its
    /// grace period are logged and reflected in the report; they never stop
    /// the checkpoint from being written to `batch_start + batch.len()`.
    pub async fn run_batch(&self, batch_start: usize, batch: &[Target]) -> BatchReport {
        let started = Instant::now();
        let plan = self.plan(batch.len());
        let mut report = BatchReport {
            start: batch_start,
            end: batch_start + batch.len(),
            direct_targets: plan.direct.len(),
            pool_workers: plan.chunks.len(),
            proxied_workers: plan.proxied_chunks(),
            pool: WorkerReport::default(),
            supervisor: None,
            supervisor_aborted: false,
            unretried: 0,
            checkpoint_saved: false,
            elapsed: Duration::ZERO,
        };

        tracing::info!(
            batch_start,
            "Direct slice: {} targets, pool: {} workers ({} proxied) for {} targets",
            plan.direct.len(),
            plan.chunks.len(),
            plan.proxied_chunks(),
            batch.len() - plan.direct.len()
        );

        let (retry_tx, retry_rx) = retry_channel();
        let leftovers = retry_rx.leftovers();

        let mut supervisor_handle = if plan.launches_supervisor() {
            let supervisor = DirectSupervisor::new(
                self.worker.clone(),
                format!("direct-{}", batch_start),
                self.config.batch.retry_poll(),
            );
            let initial = batch[plan.direct.clone()].to_vec();
            Some(tokio::spawn(supervisor.run(initial, retry_rx)))
        } else {
            drop(retry_rx);
            None
        };

        let mut pool = JoinSet::new();
        for (i, chunk) in plan.chunks.iter().enumerate() {
            let worker = self.worker.clone();
            let tx = retry_tx.clone();
            let label = format!("pool-{}-{}", batch_start, i);
            let work = WorkChunk::new(batch[chunk.range.clone()].to_vec(), chunk.proxy.clone());
            pool.spawn(async move { worker.run(&label, &work, Some(&tx)).await });
        }

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcome) => report.pool.merge(&outcome),
                Err(e) => tracing::error!(batch_start, "Pool worker failed: {}", e),
            }
        }
        tracing::info!(
            batch_start,
            "Pool workers done: {} written, {} requeued",
            report.pool.written,
            report.pool.requeued
        );

        retry_tx.stop();
        drop(retry_tx);

        if let Some(handle) = supervisor_handle.as_mut() {
            let grace = self.config.batch.supervisor_grace();
            match tokio::time::timeout(grace, &mut *handle).await {
                Ok(Ok(outcome)) => report.supervisor = Some(outcome),
                Ok(Err(e)) => tracing::error!(batch_start, "Direct supervisor failed: {}", e),
                Err(_) => {
                    tracing::warn!(
                        batch_start,
                        "Direct supervisor did not stop within {}s, aborting it",
                        grace.as_secs()
                    );
                    handle.abort();
                    if let Err(e) = (&mut *handle).await {
                        tracing::debug!(batch_start, "Direct supervisor ended: {}", e);
                    }
                    report.supervisor_aborted = true;

                    let dropped = leftovers.drain().await;
                    for target in &dropped {
                        tracing::warn!(
                            batch_start,
                            target_url = %target,
                            "Dropping requeued target, supervisor was aborted"
                        );
                    }
                    if !dropped.is_empty() {
                        tracing::warn!(
                            batch_start,
                            "{} requeued targets were never retried",
                            dropped.len()
                        );
                    }
                    report.unretried = dropped.len();
                }
            }
        }

        match self.checkpoint.save(report.end) {
            Ok(()) => report.checkpoint_saved = true,
            Err(e) => tracing::error!(batch_start, "Failed to save checkpoint: {}", e),
        }

        report.elapsed = started.elapsed();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::test_support::{
        page, zero_delay_configs, EchoExtractor, MemorySink, ScriptedRenderer, Step,
    };
    use tempfile::TempDir;

    fn create_test_config(desired: usize, without_proxy: usize, cpu: usize) -> BatchConfig {
        BatchConfig {
            desired_pool_workers: desired,
            pool_workers_without_proxy: without_proxy,
            cpu_count: Some(cpu),
            ..BatchConfig::default()
        }
    }

    fn assert_complete(plan: &BatchPlan, n: usize) {
        assert_eq!(plan.direct.start, 0);
        let mut next = plan.direct.end;
        for chunk in &plan.chunks {
            assert_eq!(chunk.range.start, next, "chunks must be contiguous");
            assert!(!chunk.is_empty());
            next = chunk.range.end;
        }
        assert_eq!(next, n);
        assert_eq!(plan.covered(), n);
    }

    #[test]
    fn test_nine_targets_split_three_six() {
        let plan = plan_batch(9, &create_test_config(19, 4, 16), &ProxyPool::default());
        assert_eq!(plan.direct, 0..3);
        assert_eq!(plan.chunks.len(), 6);
        assert!(plan.chunks.iter().all(|c| c.len() == 1));
        assert_complete(&plan, 9);
    }

    #[test]
    fn test_empty_pool_means_no_proxies() {
        let plan = plan_batch(100, &create_test_config(19, 4, 5), &ProxyPool::default());
        assert_eq!(plan.direct, 0..34);
        assert_eq!(plan.chunks.len(), 4);
        assert_eq!(plan.proxied_chunks(), 0);
        assert_complete(&plan, 100);
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        let plan = plan_batch(100, &create_test_config(4, 0, 16), &ProxyPool::default());
        let lens: Vec<usize> = plan.chunks.iter().map(ChunkPlan::len).collect();
        assert_eq!(lens, vec![16, 16, 16, 18]);
    }

    #[test]
    fn test_proxies_assigned_round_robin_after_unproxied() {
        let proxies = ProxyPool::from_lines(["1.1.1.1:80", "2.2.2.2:80"]);
        let plan = plan_batch(100, &create_test_config(5, 2, 16), &proxies);

        let hosts: Vec<Option<&str>> = plan
            .chunks
            .iter()
            .map(|c| c.proxy.as_ref().map(|p| p.host()))
            .collect();
        assert_eq!(
            hosts,
            vec![None, None, Some("1.1.1.1"), Some("2.2.2.2"), Some("1.1.1.1")]
        );
    }

    #[test]
    fn test_zero_pool_folds_into_direct() {
        let plan = plan_batch(10, &create_test_config(0, 0, 16), &ProxyPool::default());
        assert_eq!(plan.direct, 0..10);
        assert!(plan.chunks.is_empty());
        assert!(plan.launches_supervisor());
    }

    #[test]
    fn test_single_cpu_runs_direct_only() {
        let plan = plan_batch(50, &create_test_config(19, 4, 1), &ProxyPool::default());
        assert_eq!(plan.direct, 0..50);
        assert!(plan.chunks.is_empty());
    }

    #[test]
    fn test_single_target() {
        let plan = plan_batch(1, &create_test_config(19, 4, 8), &ProxyPool::default());
        assert_eq!(plan.direct, 0..1);
        assert!(plan.chunks.is_empty());
    }

    #[test]
    fn test_empty_batch_launches_nothing() {
        let plan = plan_batch(0, &create_test_config(19, 4, 8), &ProxyPool::default());
        assert!(!plan.launches_supervisor());
        assert_eq!(plan.covered(), 0);
    }

    #[test]
    fn test_partition_is_complete() {
        let proxies = ProxyPool::from_lines(["1.1.1.1:80"]);
        for n in 1..=120 {
            for desired in [0, 1, 3, 19, 200] {
                for cpu in [1, 2, 5, 64] {
                    let plan = plan_batch(n, &create_test_config(desired, 2, cpu), &proxies);
                    assert_complete(&plan, n);
                    assert!(plan.chunks.len() <= desired.min(cpu.saturating_sub(1)));
                }
            }
        }
    }

    fn create_test_scheduler(
        dir: &TempDir,
        batch: BatchConfig,
        renderer: Arc<ScriptedRenderer>,
        sink: Arc<MemorySink>,
    ) -> BatchScheduler {
        let (render, pacing) = zero_delay_configs();
        let mut config = Config::default();
        config.batch = BatchConfig {
            retry_poll_millis: 10,
            ..batch
        };
        let worker = UnitWorker::new(renderer, Arc::new(EchoExtractor), sink, &render, &pacing);
        BatchScheduler::new(
            Arc::new(config),
            Arc::new(ProxyPool::default()),
            worker,
            ProgressCheckpoint::new(dir.path().join("progress.txt")),
        )
    }

    #[tokio::test]
    async fn test_run_batch_writes_every_target_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(ScriptedRenderer::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let scheduler = create_test_scheduler(
            &dir,
            create_test_config(3, 1, 8),
            renderer.clone(),
            sink.clone(),
        );
        let batch: Vec<Target> = (0..9).map(|i| format!("https://example.test/u{}", i)).collect();

        let report = scheduler.run_batch(20, &batch).await;

        assert_eq!(report.written(), 9);
        assert_eq!(report.pool_workers, 3);
        assert!(report.checkpoint_saved);
        assert!(!report.supervisor_aborted);
        assert_eq!(renderer.total_calls(), 9);
        // One session for the supervisor's initial slice, one per pool worker
        assert_eq!(renderer.proxies_seen(), vec![None; 4]);
        let mut urls = sink.urls();
        urls.sort();
        let mut expected = batch.clone();
        expected.sort();
        assert_eq!(urls, expected);
        assert_eq!(ProgressCheckpoint::new(dir.path().join("progress.txt")).load(), 29);
    }

    #[tokio::test]
    async fn test_pool_failures_are_retried_by_supervisor() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(ScriptedRenderer::new(vec![(
            "https://example.test/flaky",
            vec![page("broken"), page("broken"), page("42")],
        )]));
        let sink = Arc::new(MemorySink::default());
        let scheduler = create_test_scheduler(
            &dir,
            create_test_config(2, 0, 8),
            renderer.clone(),
            sink.clone(),
        );
        let batch: Vec<Target> = vec![
            "https://example.test/a".into(),
            "https://example.test/b".into(),
            "https://example.test/flaky".into(),
        ];

        let report = scheduler.run_batch(0, &batch).await;

        let supervisor = report.supervisor.unwrap();
        assert_eq!(report.pool.requeued, 1);
        assert_eq!(supervisor.retried, 1);
        // "broken" is an extraction error, so the requeued attempt fails too
        assert_eq!(supervisor.retries.dropped, 1);
        assert_eq!(renderer.calls("https://example.test/flaky"), 2);
        assert_eq!(sink.rows().len(), 2);
        assert!(report.checkpoint_saved);
    }

    #[tokio::test]
    async fn test_slow_supervisor_is_aborted_and_batch_checkpointed() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(ScriptedRenderer::new(vec![
            (
                "https://example.test/slow",
                vec![Step::Stall(Duration::from_secs(30), "1".into())],
            ),
            ("https://example.test/boom", vec![Step::Panic]),
            ("https://example.test/bad", vec![page("broken")]),
        ]));
        let sink = Arc::new(MemorySink::default());
        let batch_config = BatchConfig {
            supervisor_grace_secs: 1,
            ..create_test_config(2, 0, 8)
        };
        let scheduler = create_test_scheduler(&dir, batch_config, renderer.clone(), sink.clone());
        let batch: Vec<Target> = vec![
            "https://example.test/slow".into(),
            "https://example.test/boom".into(),
            "https://example.test/bad".into(),
        ];

        let started = Instant::now();
        let report = tokio::time::timeout(Duration::from_secs(10), scheduler.run_batch(7, &batch))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(report.supervisor_aborted);
        assert!(report.supervisor.is_none());
        // The panicking worker contributes nothing; its sibling still reports
        assert_eq!(report.pool.requeued, 1);
        assert_eq!(report.unretried, 1);
        assert!(report.checkpoint_saved);
        assert_eq!(ProgressCheckpoint::new(dir.path().join("progress.txt")).load(), 10);
        assert!(sink.rows().is_empty());
        assert_eq!(renderer.calls("https://example.test/bad"), 1);
    }

    #[tokio::test]
    async fn test_panicking_pool_worker_does_not_block_siblings() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(ScriptedRenderer::new(vec![(
            "https://example.test/boom",
            vec![Step::Panic],
        )]));
        let sink = Arc::new(MemorySink::default());
        let scheduler = create_test_scheduler(
            &dir,
            create_test_config(3, 0, 8),
            renderer.clone(),
            sink.clone(),
        );
        // Direct slice 0..3, pool chunks 3..5, 5..7, 7..9
        let batch: Vec<Target> = (0..9)
            .map(|i| {
                if i == 5 {
                    "https://example.test/boom".to_string()
                } else {
                    format!("https://example.test/u{}", i)
                }
            })
            .collect();

        let report = scheduler.run_batch(0, &batch).await;

        assert!(!report.supervisor_aborted);
        assert_eq!(report.pool.written, 4);
        assert_eq!(report.supervisor.unwrap().initial.written, 3);
        // Target 6 shared the panicking worker's chunk and is lost with it
        let urls = sink.urls();
        assert_eq!(urls.len(), 7);
        assert!(!urls.contains(&"https://example.test/u6".to_string()));
        assert!(report.checkpoint_saved);
        assert_eq!(ProgressCheckpoint::new(dir.path().join("progress.txt")).load(), 9);
    }
}
