//! Scenario composers built on the render pipeline.
//!
//! A composer takes a [`ScenarioRequest`], downloads its sources into a
//! scoped [`JobWorkspace`], lays out the pipelines the scenario calls for,
//! renders once, uploads the result through an [`ArtifactStore`] and records
//! it in a [`RecordStore`].
//!
//! # Flow
//!
//! ```text
//! validate ─► workspace ─► fetch (parallel, retried) ─► build pipeline
//!                                                          │
//!            record ◄── upload ◄── render (bounded, retried)
//! ```
//!
//! The workspace is removed on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use reelsmith_core::composer::*;
//!
//! let composer = ScenarioComposer::new(
//!     engine,
//!     Arc::new(HttpSourceFetcher::new(&FetchConfig::default())?),
//!     Arc::new(FsArtifactStore::new("/srv/artifacts", "https://cdn.example.com")),
//!     Arc::new(SqliteRecordStore::new(Path::new("reelsmith.db"))?),
//!     "/var/tmp/reelsmith",
//! );
//!
//! let outcome = composer.compose(request).await?;
//! println!("{}", outcome.record.url);
//! ```

mod artifacts;
mod config;
mod error;
mod fetch;
mod records;
mod scenarios;
mod service;
mod traits;
mod types;
mod workspace;

pub use artifacts::FsArtifactStore;
pub use config::{ComposerConfig, FetchConfig, RetryConfig};
pub use error::{ArtifactError, ComposerError, FetchError, RecordError};
pub use fetch::HttpSourceFetcher;
pub use records::SqliteRecordStore;
pub use scenarios::build_pipeline;
pub use service::ScenarioComposer;
pub use traits::{ArtifactStore, RecordStore, SourceFetcher};
pub use types::{
    ComposeOutcome, PreparedVideo, PreparedVideoFilter, ScenarioKind, ScenarioRequest, SourceRef,
    StoredArtifact,
};
pub use workspace::JobWorkspace;
