//! Mock media probe for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::render::{MediaInfo, MediaProbe, RenderError};

/// Mock implementation of the MediaProbe trait.
///
/// Unknown paths report a 10 second 1080x1920 clip with audio. Per-path
/// results and failures can be configured, and every call is counted.
#[derive(Debug)]
pub struct MockProbe {
    /// Pre-configured results by path.
    media: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// Paths that fail to probe.
    failing: Arc<RwLock<HashSet<PathBuf>>>,
    /// Inspect calls per path.
    calls: Arc<RwLock<HashMap<PathBuf, usize>>>,
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// Create a new mock probe.
    pub fn new() -> Self {
        Self {
            media: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Report `duration_secs` and audio presence for `path`.
    pub async fn set_media(&self, path: impl AsRef<Path>, duration_secs: f64, has_audio: bool) {
        let path = path.as_ref();
        let mut info = Self::clip(path, duration_secs);
        if !has_audio {
            info.audio_codec = None;
            info.audio_sample_rate = None;
            info.audio_channels = None;
        }
        self.media.write().await.insert(path.to_path_buf(), info);
    }

    /// Set a full probe result for `path`.
    pub async fn set_media_info(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.media
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Make probing `path` fail.
    pub async fn fail_path(&self, path: impl AsRef<Path>) {
        self.failing
            .write()
            .await
            .insert(path.as_ref().to_path_buf());
    }

    /// Number of inspect calls made for `path`.
    pub async fn probe_count(&self, path: impl AsRef<Path>) -> usize {
        self.calls
            .read()
            .await
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// A vertical clip with stereo AAC audio.
    pub fn clip(path: &Path, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: path.to_path_buf(),
            size_bytes: 5 * 1024 * 1024,
            duration_secs,
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            video_width: Some(1080),
            video_height: Some(1920),
            video_fps: Some(30.0),
            audio_codec: Some("aac".to_string()),
            audio_sample_rate: Some(44100),
            audio_channels: Some(2),
        }
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    fn name(&self) -> &str {
        "mock"
    }

    async fn inspect(&self, path: &Path) -> Result<MediaInfo, RenderError> {
        *self
            .calls
            .write()
            .await
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        if self.failing.read().await.contains(path) {
            return Err(RenderError::probe_failed(path, "mock probe failure"));
        }

        if let Some(info) = self.media.read().await.get(path) {
            return Ok(info.clone());
        }

        Ok(Self::clip(path, 10.0))
    }
}
