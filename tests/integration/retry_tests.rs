//! Failure routing: every target ends with exactly one terminal outcome

use crate::common::{create_test_config, csv_urls, target, Behavior, FakeExtractor, FakeRenderer};
use profile_harvest::RunController;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_every_target_has_one_terminal_outcome() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 40, 20);
    let csv_path = config.output.csv_path();

    let renderer = FakeRenderer::new()
        .with_behavior(target(3), Behavior::AlwaysTimeout)
        .with_behavior(target(15), Behavior::FailFirstPass)
        .with_behavior(target(19), Behavior::AlwaysBroken)
        .with_behavior(target(33), Behavior::FailFirstPass);

    let report = RunController::new(config, Arc::new(renderer), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    let totals = report.totals();
    assert_eq!(totals.written + totals.dropped + totals.sink_failures, 40);

    let rows = csv_urls(&csv_path);
    let unique: HashSet<&String> = rows.iter().collect();
    assert_eq!(unique.len(), rows.len(), "no target is written twice");
    assert!(rows.contains(&target(15)));
    assert!(rows.contains(&target(33)));
    assert!(!rows.contains(&target(3)));
    assert!(!rows.contains(&target(19)));
    assert_eq!(rows.len(), 38);
}

#[tokio::test]
async fn test_requeued_target_gets_one_more_pass() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 12, 12);

    // Targets 4.. go to pool workers with these settings
    let renderer = FakeRenderer::new()
        .with_behavior(target(11), Behavior::AlwaysBroken)
        .with_behavior(target(7), Behavior::FailFirstPass);

    let report = RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert_eq!(renderer.calls(&target(11)), 2);
    assert_eq!(renderer.calls(&target(7)), 2);
    let supervisor = report.batches[0].supervisor.unwrap();
    assert_eq!(supervisor.retried, 2);
    assert_eq!(supervisor.retries.written, 1);
    assert_eq!(supervisor.retries.dropped, 1);
}

#[tokio::test]
async fn test_direct_slice_failures_are_dropped() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 12, 12);

    // Target 0 is always in the direct slice
    let renderer = FakeRenderer::new().with_behavior(target(0), Behavior::FailFirstPass);

    let report = RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert_eq!(renderer.calls(&target(0)), 1);
    let supervisor = report.batches[0].supervisor.unwrap();
    assert_eq!(supervisor.initial.dropped, 1);
    assert_eq!(supervisor.retried, 0);
    assert_eq!(report.written(), 11);
}

#[tokio::test]
async fn test_timeouts_retry_within_a_pass() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 12, 12);

    let renderer = FakeRenderer::new().with_behavior(target(10), Behavior::AlwaysTimeout);

    RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    // Three attempts in the pool worker, three more in the supervisor's pass
    assert_eq!(renderer.calls(&target(10)), 6);
}
