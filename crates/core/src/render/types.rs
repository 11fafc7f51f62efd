//! Types shared by the render module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a media file, as reported by the probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds (0.0 when unknown).
    pub duration_secs: f64,
    /// Container format name.
    pub format: String,
    /// Video codec, if there is a video stream.
    pub video_codec: Option<String>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_fps: Option<f32>,
    /// Audio codec, if there is an audio stream.
    pub audio_codec: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u8>,
}

impl MediaInfo {
    /// Whether the file has a video stream.
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    /// Whether the file has an audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// Output captured from a successful transcoder run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code (always 0 for successful runs on unix).
    pub exit_code: Option<i32>,
    /// Captured diagnostic stream.
    pub stderr: String,
    /// Wall-clock duration of the process in milliseconds.
    pub duration_ms: u64,
}

/// Progress update for a running render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderProgress {
    /// Progress percentage (0-100).
    pub percent: f32,
    /// Output time position in seconds.
    pub time_secs: f64,
    /// Total expected output duration in seconds, when known.
    pub duration_secs: Option<f64>,
    /// Encoding speed (e.g., "2.5x").
    pub speed: Option<String>,
}

/// Result of a successful `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    /// Output file path.
    pub output_path: PathBuf,
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Number of streams combined into the output.
    pub streams: usize,
    /// Expected output duration in seconds.
    pub duration_secs: f64,
    /// Time taken in milliseconds.
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_info_stream_flags() {
        let info = MediaInfo {
            path: PathBuf::from("/clip.mp4"),
            size_bytes: 1024,
            duration_secs: 10.0,
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            video_width: Some(1080),
            video_height: Some(1920),
            video_fps: Some(30.0),
            audio_codec: None,
            audio_sample_rate: None,
            audio_channels: None,
        };
        assert!(info.has_video());
        assert!(!info.has_audio());
    }

    #[test]
    fn test_progress_serialization() {
        let progress = RenderProgress {
            percent: 50.0,
            time_secs: 5.0,
            duration_secs: Some(10.0),
            speed: Some("2.0x".to_string()),
        };
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"percent\":50.0"));
    }
}
