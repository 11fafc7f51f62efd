//! Filesystem-backed artifact store.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::info;

use super::error::ArtifactError;
use super::traits::ArtifactStore;
use super::types::StoredArtifact;
use crate::config::ArtifactsConfig;

const BUFFER_SIZE: usize = 256 * 1024;

/// Copies artifacts into a directory served under `base_url`.
pub struct FsArtifactStore {
    dir: PathBuf,
    base_url: String,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self::new(config.dir.clone(), config.base_url.clone())
    }

    /// Public URL for a stored name.
    pub fn url_for(&self, remote_name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(remote_name)
        )
    }

    fn check_name(remote_name: &str) -> Result<(), ArtifactError> {
        let invalid = remote_name.is_empty()
            || remote_name == "."
            || remote_name == ".."
            || remote_name.contains(['/', '\\'])
            || remote_name.starts_with('.');
        if invalid {
            return Err(ArtifactError::InvalidName {
                name: remote_name.to_string(),
            });
        }
        Ok(())
    }

    /// Copies `source` to `destination`, returning the byte count and hex SHA-256.
    async fn copy_with_checksum(
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, String), ArtifactError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                ArtifactError::Io(e)
            }
        })?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, File::create(destination).await?);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer.write_all(&buffer[..bytes_read]).await?;
            total_bytes += bytes_read as u64;
        }
        writer.flush().await?;

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn upload(
        &self,
        path: &Path,
        remote_name: &str,
    ) -> Result<StoredArtifact, ArtifactError> {
        Self::check_name(remote_name)?;
        fs::create_dir_all(&self.dir).await?;

        let destination = self.dir.join(remote_name);
        let partial = self.dir.join(format!(".{}.part", remote_name));
        let (size_bytes, checksum) = match Self::copy_with_checksum(path, &partial).await {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        fs::rename(&partial, &destination).await?;

        let url = self.url_for(remote_name);
        info!(
            path = %destination.display(),
            size_bytes,
            url = %url,
            "Stored artifact"
        );

        Ok(StoredArtifact {
            url,
            size_bytes,
            checksum: Some(checksum),
        })
    }
}
