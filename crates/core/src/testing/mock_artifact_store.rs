//! Mock artifact store for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::composer::{ArtifactError, ArtifactStore, StoredArtifact};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: PathBuf,
    pub remote_name: String,
    /// File size when the upload happened.
    pub size_bytes: u64,
}

/// Mock implementation of the ArtifactStore trait.
///
/// Uploads are recorded, not copied; URLs look like `mock://artifacts/<name>`.
#[derive(Debug)]
pub struct MockArtifactStore {
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    errors: Arc<RwLock<VecDeque<ArtifactError>>>,
}

impl Default for MockArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArtifactStore {
    /// Create a new mock artifact store.
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Get all recorded uploads.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Queue an error for the next upload.
    pub async fn push_error(&self, error: ArtifactError) {
        self.errors.write().await.push_back(error);
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(
        &self,
        path: &Path,
        remote_name: &str,
    ) -> Result<StoredArtifact, ArtifactError> {
        if let Some(err) = self.errors.write().await.pop_front() {
            return Err(err);
        }

        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(|_| ArtifactError::SourceNotFound {
                path: path.to_path_buf(),
            })?
            .len();

        self.uploads.write().await.push(RecordedUpload {
            path: path.to_path_buf(),
            remote_name: remote_name.to_string(),
            size_bytes,
        });

        Ok(StoredArtifact {
            url: format!("mock://artifacts/{}", remote_name),
            size_bytes,
            checksum: None,
        })
    }
}
