//! HTTP source fetcher.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::config::FetchConfig;
use super::error::FetchError;
use super::traits::SourceFetcher;
use crate::metrics;

/// Streams `http(s)://` sources to disk; `file://` sources are copied.
pub struct HttpSourceFetcher {
    client: Client,
}

impl HttpSourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    async fn copy_local(&self, url: &str, source: &str, path: &Path) -> Result<u64, FetchError> {
        let source = urlencoding::decode(source).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(tokio::fs::copy(source.as_ref(), path).await?)
    }

    async fn download(&self, url: &str, partial: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut writer = BufWriter::new(File::create(partial).await?);
        let mut stream = response.bytes_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            writer.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(total)
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn save_file_to_disk(&self, url: &str, path: &Path) -> Result<PathBuf, FetchError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = if let Some(source) = url.strip_prefix("file://") {
            self.copy_local(url, source, path).await?
        } else if url.starts_with("http://") || url.starts_with("https://") {
            // Write next to the target and rename, so a failed download leaves nothing behind.
            let partial = path.with_extension("part");
            match self.download(url, &partial).await {
                Ok(bytes) => {
                    tokio::fs::rename(&partial, path).await?;
                    bytes
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(e);
                }
            }
        } else {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: "expected http, https or file scheme".to_string(),
            });
        };

        metrics::DOWNLOADED_BYTES.inc_by(bytes);
        debug!(url, path = %path.display(), bytes, "Saved source");
        Ok(path.to_path_buf())
    }
}

/// File extension of the last path segment of `url`, ignoring query and fragment.
pub(crate) fn url_extension(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = without_query.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
