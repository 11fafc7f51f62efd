//! Error types for the render module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, compiling or running a pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Illegal call sequence on a pipeline (double init, concat on a member,
    /// operation before init, ...).
    #[error("Invalid pipeline state: {reason}")]
    InvalidState { reason: String },

    /// An operation was given an argument it cannot compile.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Media metadata could not be extracted.
    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    /// The transcoder exited with a non-zero status.
    #[error("FFmpeg exited with code {exit_code:?}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The transcoder did not finish within the configured timeout.
    #[error("Render timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The configured binary could not be spawned.
    #[error("Binary not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// I/O error around the external process or the output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Creates an invalid state error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a probe failed error.
    pub fn probe_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a process failed error carrying the captured diagnostics.
    pub fn process_failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ProcessFailed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Captured diagnostic text, if this error came from the transcoder.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ProcessFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
