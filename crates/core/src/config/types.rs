use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::composer::{ComposerConfig, FetchConfig};
use crate::render::RenderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub records: RecordsConfig,
}

/// Per-job scratch directories
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("reelsmith")
}

/// Where finished artifacts are published
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
    /// Public URL prefix the artifact names are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            base_url: default_base_url(),
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_base_url() -> String {
    "http://localhost:8080/artifacts".to_string()
}

/// Prepared-video record database
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordsConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelsmith.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.render.width, 1080);
        assert_eq!(config.composer.max_parallel_renders, 2);
        assert_eq!(config.records.path.to_str().unwrap(), "reelsmith.db");
    }

    #[test]
    fn test_deserialize_sections() {
        let toml = r#"
[render]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
width = 720
height = 1280

[composer.retry]
max_attempts = 5

[artifacts]
dir = "/srv/artifacts"
base_url = "https://cdn.example.com/reels"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.render.ffmpeg_path.to_str().unwrap(), "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.render.height, 1280);
        assert_eq!(config.composer.retry.max_attempts, 5);
        assert_eq!(config.composer.retry.backoff_multiplier, 2.0); // default
        assert_eq!(config.artifacts.base_url, "https://cdn.example.com/reels");
    }

    #[test]
    fn test_serialized_config_carries_no_credentials() {
        let config: Config = toml::from_str(
            r#"
[publishing]
access_token = "EAAG-secret"
"#,
        )
        .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("EAAG-secret"));
        assert!(!json.contains("publishing"));
    }
}
