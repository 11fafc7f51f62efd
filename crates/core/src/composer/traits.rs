//! Trait definitions for the composer's collaborators.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::{ArtifactError, FetchError, RecordError};
use super::types::{PreparedVideo, PreparedVideoFilter, StoredArtifact};

/// Downloads remote sources into the job workspace.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Saves `url` to `path` and returns the path written.
    ///
    /// A failed download leaves nothing at `path`.
    async fn save_file_to_disk(&self, url: &str, path: &Path) -> Result<PathBuf, FetchError>;
}

/// Publishes finished renders.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Uploads `path` under `remote_name` and returns where it can be downloaded.
    async fn upload(&self, path: &Path, remote_name: &str)
        -> Result<StoredArtifact, ArtifactError>;
}

/// Storage for prepared-video records.
pub trait RecordStore: Send + Sync {
    /// Stores a new record.
    fn add_prepared_video(&self, video: &PreparedVideo) -> Result<(), RecordError>;

    /// Oldest record matching `filter`, if any.
    fn get_one_prepared_video(
        &self,
        filter: &PreparedVideoFilter,
    ) -> Result<Option<PreparedVideo>, RecordError>;
}
