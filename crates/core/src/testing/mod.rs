//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait
//! (transcoder, probe, fetcher, artifact store, record store), so pipelines
//! and composers can be exercised without ffmpeg or a network.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelsmith_core::testing::{MockProbe, MockRunner};
//!
//! let probe = Arc::new(MockProbe::new());
//! let runner = Arc::new(MockRunner::new());
//! let engine = RenderEngine::new(probe.clone(), runner.clone(), RenderConfig::default());
//!
//! probe.set_media("/clips/a.mp4", 5.0, false).await;
//! // ...build and run a pipeline...
//! assert_eq!(runner.execution_count().await, 1);
//! ```

mod mock_artifact_store;
mod mock_fetcher;
mod mock_probe;
mod mock_record_store;
mod mock_runner;

pub use mock_artifact_store::{MockArtifactStore, RecordedUpload};
pub use mock_fetcher::{MockFetcher, RecordedFetch};
pub use mock_probe::MockProbe;
pub use mock_record_store::MockRecordStore;
pub use mock_runner::MockRunner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::{MockProbe, MockRunner};
    use crate::composer::{ScenarioKind, ScenarioRequest};
    use crate::render::{RenderConfig, RenderEngine};

    /// An engine wired to fresh mocks, returned alongside them.
    pub fn mock_engine() -> (RenderEngine, Arc<MockProbe>, Arc<MockRunner>) {
        let probe = Arc::new(MockProbe::new());
        let runner = Arc::new(MockRunner::new());
        let engine = RenderEngine::new(probe.clone(), runner.clone(), RenderConfig::default());
        (engine, probe, runner)
    }

    /// A banner-append request for one account.
    pub fn banner_request(job_id: &str) -> ScenarioRequest {
        ScenarioRequest {
            job_id: job_id.to_string(),
            accounts: vec!["brand.main".to_string()],
            caption: Some("Out now".to_string()),
            scenario: ScenarioKind::BannerAppend {
                source_url: "https://cdn.example.com/clips/source.mp4".to_string(),
                banner_url: "https://cdn.example.com/clips/banner.mp4".to_string(),
            },
        }
    }

    /// A shortify request cutting `max_duration_secs` from the start.
    pub fn shortify_request(job_id: &str, max_duration_secs: f64) -> ScenarioRequest {
        ScenarioRequest {
            job_id: job_id.to_string(),
            accounts: vec!["brand.main".to_string()],
            caption: None,
            scenario: ScenarioKind::Shortify {
                source_url: "https://cdn.example.com/clips/long.mp4".to_string(),
                start_secs: 0.0,
                max_duration_secs,
                quarter_turns: 1,
            },
        }
    }
}
