//! Run coordinator integration tests.
//!
//! A run walks all sources in order; a failing or panicking source is
//! reported and does not stop the ones after it.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use newsstand_core::{
    testing::{MockCleaner, MockFanOutSource, MockSingleSource, MockStore},
    ArtifactStore, DedupStore, IssueOutcome, IssueProcessor, KeyValueStore, LockService,
    MemoryStore, ProcessorSettings, RunCoordinator, Source, Stage,
};

fn coordinator(temp_dir: &TempDir, cleaner: Arc<MockCleaner>) -> RunCoordinator {
    coordinator_over(Arc::new(MemoryStore::new()), temp_dir, cleaner)
}

fn coordinator_over(
    store: Arc<dyn KeyValueStore>,
    temp_dir: &TempDir,
    cleaner: Arc<MockCleaner>,
) -> RunCoordinator {
    let processor = IssueProcessor::new(
        LockService::new(store.clone()),
        DedupStore::new(store),
        ArtifactStore::new(temp_dir.path().join("data")),
        cleaner,
        ProcessorSettings {
            lock_ttl: Duration::from_secs(3600),
            retention: Duration::from_secs(2 * 86_400),
            scratch_root: temp_dir.path().join("tmp"),
            fan_out_errors_are_failures: false,
        },
    );
    RunCoordinator::new(processor)
}

#[tokio::test]
async fn test_failures_are_isolated_per_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let cleaner = Arc::new(MockCleaner::new());

    let ok_first = Arc::new(MockSingleSource::new("first", "1"));
    let failing = Arc::new(MockSingleSource::new("failing", "2"));
    failing.set_fail_download(true).await;
    let panicking = Arc::new(MockSingleSource::new("panicking", "3"));
    panicking.set_panic_on_download(true).await;
    let degraded = Arc::new(MockFanOutSource::new("bulk", "bulk-20240101"));
    degraded.set_error("manifest unavailable").await;
    let ok_last = Arc::new(MockSingleSource::new("last", "5"));

    let sources = vec![
        Source::single("first", ok_first.clone()),
        Source::single("failing", failing),
        Source::single("panicking", panicking),
        Source::fan_out("bulk", degraded),
        Source::single("last", ok_last.clone()),
    ];

    let report = coordinator(&temp_dir, cleaner.clone())
        .run_all(&sources)
        .await;

    let order: Vec<&str> = report.outcomes.iter().map(|o| o.source.as_str()).collect();
    assert_eq!(order, vec!["first", "failing", "panicking", "bulk", "last"]);

    let labels: Vec<&str> = report.outcomes.iter().map(|o| o.outcome.label()).collect();
    assert_eq!(
        labels,
        vec!["completed", "failed", "failed", "degraded", "completed"]
    );
    assert!(report.has_failures());
    assert_eq!(report.failed_sources(), vec!["failing", "panicking"]);
    assert!(report.finished_at >= report.started_at);

    assert_eq!(ok_first.download_count().await, 1);
    assert_eq!(ok_last.download_count().await, 1);
    assert_eq!(cleaner.call_count().await, 5);
}

#[tokio::test]
async fn test_repeated_run_skips_completed_sources() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let cleaner = Arc::new(MockCleaner::new());
    let coordinator = coordinator(&temp_dir, cleaner);
    let mock = Arc::new(MockSingleSource::new("etemad", "4521"));
    let sources = vec![Source::single("etemad", mock.clone())];

    let first = coordinator.run_all(&sources).await;
    let second = coordinator.run_all(&sources).await;

    assert!(!first.has_failures());
    assert_eq!(first.count("completed"), 1);
    assert_eq!(
        second.outcomes[0].outcome,
        IssueOutcome::SkippedDuplicate {
            issue: "4521".to_string()
        }
    );
    assert_eq!(mock.download_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_store_fails_every_source_but_run_finishes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let cleaner = Arc::new(MockCleaner::new());
    let store = Arc::new(MockStore::new());
    store.set_unreachable(true).await;

    let first = Arc::new(MockSingleSource::new("first", "1"));
    let bulk = Arc::new(MockFanOutSource::new("bulk", "bulk-20240101"));
    let last = Arc::new(MockSingleSource::new("last", "3"));
    let sources = vec![
        Source::single("first", first.clone()),
        Source::fan_out("bulk", bulk.clone()),
        Source::single("last", last.clone()),
    ];

    let report = coordinator_over(store, &temp_dir, cleaner.clone())
        .run_all(&sources)
        .await;

    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes.iter().all(|o| matches!(
        o.outcome,
        IssueOutcome::Failed {
            stage: Stage::Lock,
            ..
        }
    )));
    assert_eq!(report.failed_sources(), vec!["first", "bulk", "last"]);
    assert_eq!(first.download_count().await, 0);
    assert_eq!(bulk.download_count().await, 0);
    assert_eq!(last.download_count().await, 0);
    assert_eq!(cleaner.call_count().await, 3);
}

#[tokio::test]
async fn test_empty_run() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let report = coordinator(&temp_dir, Arc::new(MockCleaner::new()))
        .run_all(&[])
        .await;

    assert!(report.outcomes.is_empty());
    assert!(!report.has_failures());
    assert!(report.summary_lines().is_empty());
}
