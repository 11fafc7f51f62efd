//! Mock source fetcher for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::composer::{FetchError, SourceFetcher};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: String,
    pub path: PathBuf,
    pub success: bool,
}

/// Mock implementation of the SourceFetcher trait.
///
/// Writes placeholder bytes instead of downloading. Errors can be queued
/// for the next calls, or pinned to a URL so every attempt fails.
#[derive(Debug)]
pub struct MockFetcher {
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    errors: Arc<RwLock<VecDeque<FetchError>>>,
    /// URLs that always fail with the given HTTP status.
    failing_urls: Arc<RwLock<HashMap<String, u16>>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self {
            fetches: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            failing_urls: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Get the number of fetch attempts.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Queue an error for the next call.
    pub async fn push_error(&self, error: FetchError) {
        self.errors.write().await.push_back(error);
    }

    /// Make every fetch of `url` fail with `status`.
    pub async fn fail_url(&self, url: impl Into<String>, status: u16) {
        self.failing_urls.write().await.insert(url.into(), status);
    }

    async fn record(&self, url: &str, path: &Path, success: bool) {
        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            path: path.to_path_buf(),
            success,
        });
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn save_file_to_disk(&self, url: &str, path: &Path) -> Result<PathBuf, FetchError> {
        if let Some(status) = self.failing_urls.read().await.get(url).copied() {
            self.record(url, path, false).await;
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }

        if let Some(err) = self.errors.write().await.pop_front() {
            self.record(url, path, false).await;
            return Err(err);
        }

        tokio::fs::write(path, format!("mock source from {}", url)).await?;
        self.record(url, path, true).await;
        Ok(path.to_path_buf())
    }
}
