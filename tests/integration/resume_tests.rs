//! Checkpoint and resumption behavior of whole runs

use crate::common::{create_test_config, csv_urls, header_count, target, FakeExtractor, FakeRenderer};
use profile_harvest::storage::ProgressCheckpoint;
use profile_harvest::RunController;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_resume_from_checkpoint_starts_mid_list() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 100, 20);
    let progress = config.output.progress_path();
    ProgressCheckpoint::new(&progress).save(40).unwrap();

    let renderer = FakeRenderer::new();
    let report = RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert_eq!(report.start_index, 40);
    assert_eq!(report.batches[0].start, 40);
    assert_eq!(report.batches[0].end, 60);
    assert_eq!(report.batches[1].start, 60);
    assert_eq!(report.batches.len(), 3);

    let expected: HashSet<String> = (40..100).map(target).collect();
    assert_eq!(renderer.rendered(), expected);
    assert_eq!(ProgressCheckpoint::new(&progress).load(), 100);
}

#[tokio::test]
async fn test_checkpoint_is_not_advanced_mid_batch() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 60, 20);
    let progress = config.output.progress_path();

    let renderer = FakeRenderer::new().watching_progress(progress.clone());
    RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    for i in 0..20 {
        assert_eq!(renderer.progress_seen(&target(i)), None, "target {}", i);
    }
    for i in 20..40 {
        assert_eq!(renderer.progress_seen(&target(i)).as_deref(), Some("20"), "target {}", i);
    }
    for i in 40..60 {
        assert_eq!(renderer.progress_seen(&target(i)).as_deref(), Some("40"), "target {}", i);
    }
    assert_eq!(ProgressCheckpoint::new(&progress).load(), 60);
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 30, 10);
    let csv_path = config.output.csv_path();

    let first = RunController::new(config.clone(), Arc::new(FakeRenderer::new()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();
    assert_eq!(first.written(), 30);
    let rows_after_first = csv_urls(&csv_path);

    let renderer = FakeRenderer::new();
    let second = RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert!(second.was_noop());
    assert!(renderer.rendered().is_empty());
    assert_eq!(csv_urls(&csv_path), rows_after_first);
}

#[tokio::test]
async fn test_resumed_run_appends_with_single_header() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 20, 10);
    let csv_path = config.output.csv_path();
    let progress = config.output.progress_path();

    RunController::new(config.clone(), Arc::new(FakeRenderer::new()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    // Pretend the run died after the first batch
    ProgressCheckpoint::new(&progress).save(10).unwrap();
    RunController::new(config, Arc::new(FakeRenderer::new()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert_eq!(header_count(&csv_path), 1);
    // The replayed batch is appended again: at-least-once per batch
    assert_eq!(csv_urls(&csv_path).len(), 30);
}

#[tokio::test]
async fn test_fresh_run_truncates_and_restarts() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 15, 10);
    let csv_path = config.output.csv_path();

    RunController::new(config.clone(), Arc::new(FakeRenderer::new()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    let renderer = FakeRenderer::new();
    let report = RunController::new(config, Arc::new(renderer.clone()), Arc::new(FakeExtractor))
        .with_fresh(true)
        .run()
        .await
        .unwrap();

    assert_eq!(report.start_index, 0);
    assert_eq!(renderer.rendered().len(), 15);
    assert_eq!(header_count(&csv_path), 1);
    assert_eq!(csv_urls(&csv_path).len(), 15);
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_from_zero() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 5, 10);
    std::fs::create_dir_all(&config.output.directory).unwrap();
    std::fs::write(config.output.progress_path(), "not a number").unwrap();

    let report = RunController::new(config, Arc::new(FakeRenderer::new()), Arc::new(FakeExtractor))
        .run()
        .await
        .unwrap();

    assert_eq!(report.start_index, 0);
    assert_eq!(report.written(), 5);
}
