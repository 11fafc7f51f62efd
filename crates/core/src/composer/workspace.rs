//! Per-job scratch directories.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A working directory owned by exactly one composer job.
///
/// The directory is removed by [`remove`](Self::remove), or on drop if the job
/// ends without reaching it.
#[derive(Debug)]
pub struct JobWorkspace {
    path: PathBuf,
    removed: bool,
}

impl JobWorkspace {
    /// Creates `<root>/<job_id>-<random suffix>`.
    pub async fn create(root: &Path, job_id: &str) -> Result<Self, std::io::Error> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = root.join(format!("{}-{}", job_id, &suffix[..8]));
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created job workspace");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Deletes the directory and everything in it.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed job workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove job workspace"
            ),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove job workspace");
                }
            }
        }
    }
}
