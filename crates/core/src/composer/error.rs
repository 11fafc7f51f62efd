//! Error types for the composer module.

use std::path::PathBuf;
use thiserror::Error;

use crate::render::RenderError;

/// Errors from downloading a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL scheme or shape not supported.
    #[error("Invalid source URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Server answered with a non-success status.
    #[error("Download of {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    /// Connection, timeout or body read failure.
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Local write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Request { .. } => true,
            Self::InvalidUrl { .. } | Self::Io(_) => false,
        }
    }
}

/// Errors from publishing an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The local file to upload does not exist.
    #[error("Artifact not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Remote name is empty or escapes the store.
    #[error("Invalid artifact name: {name}")]
    InvalidName { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the prepared-video record store.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by a composer job.
#[derive(Debug, Error)]
pub enum ComposerError {
    /// Request rejected before any I/O.
    #[error("Invalid scenario request: {0}")]
    Validation(String),

    #[error("Source download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Artifact upload failed: {0}")]
    Upload(#[from] ArtifactError),

    #[error("Failed to record prepared video: {0}")]
    Record(#[from] RecordError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    /// Working directory failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Whether retrying the whole job could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Render(e) => e.is_retryable(),
            Self::Io(_) => true,
            Self::Validation(_) | Self::Upload(_) | Self::Record(_) => false,
        }
    }
}
