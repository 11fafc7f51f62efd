//! Composer lifecycle integration tests.
//!
//! These tests run scenario requests end to end against mock collaborators:
//! - Validation happens before any I/O
//! - Sources are fetched into a per-job workspace that never outlives the job
//! - Retry policy for downloads and renders
//! - Upload and record failures surface as typed errors

use std::sync::Arc;

use tempfile::TempDir;

use reelsmith_core::{
    composer::{
        ArtifactError, ComposerConfig, ComposerError, FetchError, PreparedVideoFilter,
        RecordError, RecordStore, RetryConfig, ScenarioComposer, ScenarioKind, SqliteRecordStore,
    },
    render::{Region, RenderError},
    testing::{
        fixtures::{banner_request, mock_engine, shortify_request},
        MockArtifactStore, MockFetcher, MockRecordStore, MockRunner,
    },
};

/// Composer wired to mocks, plus handles to inspect them.
struct TestHarness<R: RecordStore + 'static> {
    composer: ScenarioComposer<MockFetcher, MockArtifactStore, R>,
    runner: Arc<MockRunner>,
    fetcher: Arc<MockFetcher>,
    artifacts: Arc<MockArtifactStore>,
    records: Arc<R>,
    root: TempDir,
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
    }
}

impl<R: RecordStore + 'static> TestHarness<R> {
    fn with_records(records: Arc<R>) -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let (engine, _probe, runner) = mock_engine();
        let fetcher = Arc::new(MockFetcher::new());
        let artifacts = Arc::new(MockArtifactStore::new());

        let composer = ScenarioComposer::new(
            engine,
            fetcher.clone(),
            artifacts.clone(),
            records.clone(),
            root.path().join("work"),
        )
        .with_config(ComposerConfig::default().with_retry(fast_retry()));

        Self {
            composer,
            runner,
            fetcher,
            artifacts,
            records,
            root,
        }
    }

    /// Number of job directories left under the workspace root.
    fn leftover_workspaces(&self) -> usize {
        let work = self.root.path().join("work");
        if !work.exists() {
            return 0;
        }
        std::fs::read_dir(work).unwrap().count()
    }
}

fn harness() -> TestHarness<MockRecordStore> {
    TestHarness::with_records(Arc::new(MockRecordStore::new()))
}

#[tokio::test]
async fn test_banner_append_end_to_end() {
    let h = harness();

    let outcome = h.composer.compose(banner_request("job-1")).await.unwrap();

    assert_eq!(outcome.record.url, "mock://artifacts/job-1.mp4");
    assert_eq!(outcome.record.scenario, "banner_append");
    assert_eq!(outcome.record.accounts, vec!["brand.main"]);
    assert_eq!(outcome.render.streams, 2);
    assert!((outcome.record.duration_secs - 20.0).abs() < 1e-9);

    let fetches = h.fetcher.recorded_fetches().await;
    let names: Vec<String> = fetches
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["00_source.mp4", "01_banner.mp4"]);

    let args = h.runner.last_args().await.unwrap();
    let inputs: Vec<&String> = args
        .iter()
        .zip(args.iter().skip(1))
        .filter(|(flag, _)| flag.as_str() == "-i")
        .map(|(_, path)| path)
        .collect();
    assert!(inputs[0].ends_with("00_source.mp4"));
    assert!(inputs[1].ends_with("01_banner.mp4"));

    assert_eq!(h.artifacts.recorded_uploads().await.len(), 1);
    assert_eq!(h.records.stored(), vec![outcome.record.clone()]);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_empty_accounts_rejected_before_io() {
    let h = harness();
    let mut request = banner_request("job-2");
    request.accounts.clear();

    let err = h.composer.compose(request).await.unwrap_err();
    assert!(matches!(err, ComposerError::Validation(_)));
    assert_eq!(h.fetcher.fetch_count().await, 0);
    assert_eq!(h.runner.execution_count().await, 0);
    assert!(!h.root.path().join("work").exists());
}

#[tokio::test]
async fn test_missing_source_fails_without_retry() {
    let h = harness();
    h.fetcher
        .fail_url("https://cdn.example.com/clips/banner.mp4", 404)
        .await;

    let err = h.composer.compose(banner_request("job-3")).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Fetch(FetchError::Http { status: 404, .. })
    ));

    let banner_attempts = h
        .fetcher
        .recorded_fetches()
        .await
        .iter()
        .filter(|f| f.url.ends_with("banner.mp4"))
        .count();
    assert_eq!(banner_attempts, 1);
    assert_eq!(h.runner.execution_count().await, 0);
    assert!(h.records.stored().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_transient_download_error_is_retried() {
    let h = harness();
    h.fetcher
        .push_error(FetchError::Request {
            url: "https://cdn.example.com/clips/long.mp4".to_string(),
            reason: "connection reset".to_string(),
        })
        .await;

    let outcome = h.composer.compose(shortify_request("job-4", 15.0)).await.unwrap();
    assert_eq!(h.fetcher.fetch_count().await, 2);
    assert!((outcome.render.duration_secs - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_render_timeout_is_retried() {
    let h = harness();
    h.runner
        .push_error(RenderError::Timeout { timeout_secs: 900 })
        .await;

    h.composer.compose(shortify_request("job-5", 5.0)).await.unwrap();
    assert_eq!(h.runner.execution_count().await, 2);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_render_process_error_is_not_retried() {
    let h = harness();
    h.runner
        .push_error(RenderError::process_failed(Some(1), "Invalid data found"))
        .await;

    let err = h.composer.compose(shortify_request("job-6", 5.0)).await.unwrap_err();
    match err {
        ComposerError::Render(RenderError::ProcessFailed { stderr, .. }) => {
            assert_eq!(stderr, "Invalid data found");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.runner.execution_count().await, 1);
    assert!(h.artifacts.recorded_uploads().await.is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_upload_failure_leaves_no_record() {
    let h = harness();
    h.artifacts
        .push_error(ArtifactError::Io(std::io::Error::other("bucket unavailable")))
        .await;

    let err = h.composer.compose(banner_request("job-7")).await.unwrap_err();
    assert!(matches!(err, ComposerError::Upload(_)));
    assert!(h.records.stored().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_record_failure_surfaces() {
    let h = harness();
    h.records
        .set_next_error(RecordError::Database("disk I/O error".to_string()));

    let err = h.composer.compose(banner_request("job-8")).await.unwrap_err();
    assert!(matches!(err, ComposerError::Record(_)));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_cover_with_image_adds_overlay_input() {
    let h = harness();
    let mut request = banner_request("job-9");
    request.scenario = ScenarioKind::CoverWithImage {
        source_url: "https://cdn.example.com/clips/source.mp4".to_string(),
        image_url: "https://cdn.example.com/art/cover".to_string(),
        region: Region::new(200, 40, 1000, 600),
        max_duration_secs: 6.0,
    };

    let outcome = h.composer.compose(request).await.unwrap();
    assert_eq!(outcome.render.streams, 1);
    assert!((outcome.render.duration_secs - 6.0).abs() < 1e-9);

    let args = h.runner.last_args().await.unwrap();
    assert!(args.iter().any(|a| a.ends_with("01_cover.png")));
    let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert!(graph.contains("overlay=x=40:y=200"));
}

#[tokio::test]
async fn test_records_land_in_sqlite() {
    let h = TestHarness::with_records(Arc::new(SqliteRecordStore::in_memory().unwrap()));

    let outcome = h.composer.compose(banner_request("job-10")).await.unwrap();

    let found = h
        .records
        .get_one_prepared_video(&PreparedVideoFilter::for_account("brand.main"))
        .unwrap()
        .unwrap();
    assert_eq!(found.id, outcome.record.id);
    assert_eq!(found.caption.as_deref(), Some("Out now"));
}
