//! Media probing through ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use super::error::RenderError;
use super::types::MediaInfo;
use crate::metrics;

/// Reads metadata from media files without modifying them.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Returns the name of this probe implementation.
    fn name(&self) -> &str;

    /// Probes a media file for its stream summary.
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, RenderError>;

    /// Duration in seconds. Fails if the file has no readable video stream.
    async fn duration(&self, path: &Path) -> Result<f64, RenderError> {
        let info = self.inspect(path).await?;
        if !info.has_video() {
            return Err(RenderError::probe_failed(path, "no video stream"));
        }
        Ok(info.duration_secs)
    }

    /// Whether the file carries an audio stream.
    async fn has_audio(&self, path: &Path) -> Result<bool, RenderError> {
        Ok(self.inspect(path).await?.has_audio())
    }
}

/// ffprobe-backed probe.
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, RenderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            RenderError::probe_failed(path, format!("unparseable ffprobe output: {}", e))
        })?;

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        // Some containers only report duration on the stream.
        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .or_else(|| video_stream.and_then(|s| s.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_width: video_stream.and_then(|s| s.width),
            video_height: video_stream.and_then(|s| s.height),
            video_fps: video_stream
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_deref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
        })
    }
}

/// Parses a frame rate like "30000/1001" or "30".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.parse::<f32>().ok(),
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn inspect(&self, path: &Path) -> Result<MediaInfo, RenderError> {
        if !path.exists() {
            metrics::PROBE_FAILURES.inc();
            return Err(RenderError::probe_failed(path, "file not found"));
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::BinaryNotFound {
                        path: self.ffprobe_path.clone(),
                    }
                } else {
                    RenderError::Io(e)
                }
            })?;

        if !output.status.success() {
            metrics::PROBE_FAILURES.inc();
            return Err(RenderError::probe_failed(
                path,
                format!(
                    "ffprobe exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = Self::parse_probe_output(path, &stdout).inspect_err(|_| {
            metrics::PROBE_FAILURES.inc();
        })?;
        debug!(
            path = %path.display(),
            duration_secs = info.duration_secs,
            has_audio = info.has_audio(),
            "Probed media file"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "clip.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "10.010000",
                "size": "2500000"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1080,
                    "height": 1920,
                    "r_frame_rate": "30000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "44100",
                    "channels": 2
                }
            ]
        }"#;

        let info = FfprobeProbe::parse_probe_output(Path::new("clip.mp4"), json).unwrap();
        assert_eq!(info.format, "mov");
        assert!((info.duration_secs - 10.01).abs() < 1e-6);
        assert_eq!(info.video_width, Some(1080));
        assert!((info.video_fps.unwrap() - 29.97).abs() < 0.01);
        assert!(info.has_audio());
        assert_eq!(info.audio_channels, Some(2));
    }

    #[test]
    fn test_parse_probe_output_stream_duration_fallback() {
        let json = r#"{
            "format": { "format_name": "matroska,webm" },
            "streams": [
                { "codec_type": "video", "codec_name": "vp9", "duration": "4.5" }
            ]
        }"#;

        let info = FfprobeProbe::parse_probe_output(Path::new("clip.webm"), json).unwrap();
        assert_eq!(info.format, "matroska");
        assert!((info.duration_secs - 4.5).abs() < 1e-9);
        assert!(!info.has_audio());
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        let result = FfprobeProbe::parse_probe_output(Path::new("x.mp4"), "not json");
        assert!(matches!(result, Err(RenderError::ProbeFailed { .. })));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("1/0"), None);
    }

    #[tokio::test]
    async fn test_inspect_missing_file() {
        let probe = FfprobeProbe::new(PathBuf::from("ffprobe"));
        let result = probe.inspect(Path::new("/nonexistent/clip.mp4")).await;
        assert!(matches!(result, Err(RenderError::ProbeFailed { .. })));
    }
}
