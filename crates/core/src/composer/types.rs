//! Types for the composer module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::ComposerError;
use crate::render::{Region, RenderResult};

/// What a job produces from its sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Colour-adjusted source followed by a banner clip.
    BannerAppend { source_url: String, banner_url: String },
    /// Source cut to `max_duration_secs` with an image drawn over `region`.
    CoverWithImage {
        source_url: String,
        image_url: String,
        region: Region,
        max_duration_secs: f64,
    },
    /// A window of the source, optionally rotated, colour-adjusted.
    Shortify {
        source_url: String,
        #[serde(default)]
        start_secs: f64,
        max_duration_secs: f64,
        #[serde(default)]
        quarter_turns: i32,
    },
}

/// One file a scenario needs downloaded before compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Short role name, used in the local file name.
    pub role: &'static str,
    pub url: String,
    /// Extension used when the URL carries none.
    pub fallback_extension: &'static str,
}

impl ScenarioKind {
    /// Name used in logs, metrics and records.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::BannerAppend { .. } => "banner_append",
            ScenarioKind::CoverWithImage { .. } => "cover_with_image",
            ScenarioKind::Shortify { .. } => "shortify",
        }
    }

    /// Sources to download, in the order the scenario consumes them.
    pub fn sources(&self) -> Vec<SourceRef> {
        match self {
            ScenarioKind::BannerAppend {
                source_url,
                banner_url,
            } => vec![
                SourceRef {
                    role: "source",
                    url: source_url.clone(),
                    fallback_extension: "mp4",
                },
                SourceRef {
                    role: "banner",
                    url: banner_url.clone(),
                    fallback_extension: "mp4",
                },
            ],
            ScenarioKind::CoverWithImage {
                source_url,
                image_url,
                ..
            } => vec![
                SourceRef {
                    role: "source",
                    url: source_url.clone(),
                    fallback_extension: "mp4",
                },
                SourceRef {
                    role: "cover",
                    url: image_url.clone(),
                    fallback_extension: "png",
                },
            ],
            ScenarioKind::Shortify { source_url, .. } => vec![SourceRef {
                role: "source",
                url: source_url.clone(),
                fallback_extension: "mp4",
            }],
        }
    }

    fn validate(&self) -> Result<(), ComposerError> {
        for source in self.sources() {
            if source.url.trim().is_empty() {
                return Err(ComposerError::validation(format!(
                    "{} url is empty",
                    source.role
                )));
            }
        }

        match self {
            ScenarioKind::BannerAppend { .. } => Ok(()),
            ScenarioKind::CoverWithImage {
                region,
                max_duration_secs,
                ..
            } => {
                check_duration(*max_duration_secs)?;
                if region.width == 0 || region.height == 0 {
                    return Err(ComposerError::validation(
                        "cover region must have a non-zero area",
                    ));
                }
                Ok(())
            }
            ScenarioKind::Shortify {
                start_secs,
                max_duration_secs,
                ..
            } => {
                check_duration(*max_duration_secs)?;
                if !start_secs.is_finite() || *start_secs < 0.0 {
                    return Err(ComposerError::validation(format!(
                        "start_secs must be >= 0, got {start_secs}"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn check_duration(secs: f64) -> Result<(), ComposerError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ComposerError::validation(format!(
            "max_duration_secs must be > 0, got {secs}"
        )));
    }
    Ok(())
}

/// A composition job as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub job_id: String,
    /// Accounts the prepared video is destined for. Must not be empty.
    pub accounts: Vec<String>,
    #[serde(default)]
    pub caption: Option<String>,
    pub scenario: ScenarioKind,
}

impl ScenarioRequest {
    /// Checks every precondition that does not need I/O.
    pub fn validate(&self) -> Result<(), ComposerError> {
        if self.job_id.trim().is_empty() {
            return Err(ComposerError::validation("job_id is empty"));
        }
        if self
            .job_id
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(ComposerError::validation(format!(
                "job_id {:?} may only contain letters, digits, '-' and '_'",
                self.job_id
            )));
        }
        if self.accounts.is_empty() {
            return Err(ComposerError::validation("no target accounts"));
        }
        if self.accounts.iter().any(|a| a.trim().is_empty()) {
            return Err(ComposerError::validation("account name is empty"));
        }
        for (i, account) in self.accounts.iter().enumerate() {
            if self.accounts[..i].contains(account) {
                return Err(ComposerError::validation(format!(
                    "account {:?} listed more than once",
                    account
                )));
            }
        }
        self.scenario.validate()
    }
}

/// A finished, uploaded video waiting to be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedVideo {
    pub id: String,
    pub job_id: String,
    pub scenario: String,
    pub accounts: Vec<String>,
    pub caption: Option<String>,
    /// Download URL returned by the artifact store.
    pub url: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the uploaded file, when the store computes one.
    pub checksum: Option<String>,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

/// Criteria for [`RecordStore::get_one_prepared_video`](super::RecordStore::get_one_prepared_video).
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedVideoFilter {
    pub job_id: Option<String>,
    pub account: Option<String>,
    pub scenario: Option<String>,
}

impl PreparedVideoFilter {
    pub fn for_account(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            ..Default::default()
        }
    }

    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Default::default()
        }
    }
}

/// Where an uploaded artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub url: String,
    pub size_bytes: u64,
    pub checksum: Option<String>,
}

/// Result of a successful composer job.
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub record: PreparedVideo,
    pub render: RenderResult,
    /// Local files that were downloaded (already removed with the workspace).
    pub sources: Vec<PathBuf>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shortify() -> ScenarioRequest {
        ScenarioRequest {
            job_id: "job-1".to_string(),
            accounts: vec!["daily.clips".to_string()],
            caption: None,
            scenario: ScenarioKind::Shortify {
                source_url: "https://cdn.example.com/long.mp4".to_string(),
                start_secs: 12.0,
                max_duration_secs: 30.0,
                quarter_turns: 0,
            },
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(shortify().validate().is_ok());
    }

    #[test]
    fn test_empty_accounts_rejected() {
        let mut request = shortify();
        request.accounts.clear();
        assert!(matches!(
            request.validate(),
            Err(ComposerError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_accounts_rejected() {
        let mut request = shortify();
        request.accounts = vec![
            "daily.clips".to_string(),
            "brand.main".to_string(),
            "daily.clips".to_string(),
        ];
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("daily.clips"));
    }

    #[test]
    fn test_job_id_must_be_path_safe() {
        let mut request = shortify();
        request.job_id = "../etc".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cover_region_and_duration_checked() {
        let mut request = shortify();
        request.scenario = ScenarioKind::CoverWithImage {
            source_url: "https://cdn.example.com/a.mp4".to_string(),
            image_url: "https://cdn.example.com/cover.png".to_string(),
            region: Region::new(0, 0, 0, 100),
            max_duration_secs: 15.0,
        };
        assert!(request.validate().is_err());

        request.scenario = ScenarioKind::CoverWithImage {
            source_url: "https://cdn.example.com/a.mp4".to_string(),
            image_url: "https://cdn.example.com/cover.png".to_string(),
            region: Region::new(0, 0, 100, 100),
            max_duration_secs: 0.0,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut request = shortify();
        request.scenario = ScenarioKind::BannerAppend {
            source_url: "https://cdn.example.com/a.mp4".to_string(),
            banner_url: " ".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_from_toml() {
        let toml = r#"
job_id = "promo-42"
accounts = ["brand.main", "brand.alt"]
caption = "New drop"

[scenario]
kind = "banner_append"
source_url = "https://cdn.example.com/clip.mp4"
banner_url = "https://cdn.example.com/banner.mp4"
"#;
        let request: ScenarioRequest = toml::from_str(toml).unwrap();
        assert_eq!(request.scenario.name(), "banner_append");
        assert_eq!(request.scenario.sources().len(), 2);
        assert!(request.validate().is_ok());
    }
}
