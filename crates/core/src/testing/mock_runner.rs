//! Mock transcoder runner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::render::{ProcessOutput, ProcessRunner, RenderError, RenderProgress};

/// Mock implementation of the ProcessRunner trait.
///
/// Provides controllable behavior for testing:
/// - Record every argument list for assertions
/// - Write a small file at the output path (last argument), like ffmpeg would
/// - Queue errors, optionally after writing a partial output
///
/// # Example
///
/// ```rust,ignore
/// use reelsmith_core::testing::MockRunner;
///
/// let runner = Arc::new(MockRunner::new());
/// runner.push_error(RenderError::process_failed(Some(1), "boom")).await;
///
/// // ...run a pipeline against it...
///
/// assert_eq!(runner.execution_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockRunner {
    /// Argument lists, one per execution.
    executions: Arc<RwLock<Vec<Vec<String>>>>,
    /// Errors returned by the next executions, in order.
    errors: Arc<RwLock<VecDeque<RenderError>>>,
    /// Whether successful executions write the output file.
    write_output: Arc<RwLock<bool>>,
    /// Whether failing executions leave a partial output behind.
    partial_output_on_error: Arc<RwLock<bool>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            executions: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            write_output: Arc::new(RwLock::new(true)),
            partial_output_on_error: Arc::new(RwLock::new(false)),
        }
    }

    /// Get all recorded argument lists.
    pub async fn recorded_args(&self) -> Vec<Vec<String>> {
        self.executions.read().await.clone()
    }

    /// Get the most recent argument list.
    pub async fn last_args(&self) -> Option<Vec<String>> {
        self.executions.read().await.last().cloned()
    }

    /// Get the number of executions.
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Queue an error for the next execution without one.
    pub async fn push_error(&self, error: RenderError) {
        self.errors.write().await.push_back(error);
    }

    /// Exit cleanly without writing anything.
    pub async fn set_write_output(&self, write: bool) {
        *self.write_output.write().await = write;
    }

    /// Write a partial output before returning a queued error.
    pub async fn set_partial_output_on_error(&self, partial: bool) {
        *self.partial_output_on_error.write().await = partial;
    }

    async fn write_to(args: &[String], contents: &[u8]) -> Result<(), RenderError> {
        if let Some(output) = args.last() {
            tokio::fs::write(PathBuf::from(output), contents).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, args: &[String]) -> Result<ProcessOutput, RenderError> {
        self.executions.write().await.push(args.to_vec());

        if let Some(err) = self.errors.write().await.pop_front() {
            if *self.partial_output_on_error.read().await {
                Self::write_to(args, b"partial").await?;
            }
            return Err(err);
        }

        if *self.write_output.read().await {
            Self::write_to(args, b"mock render output").await?;
        }

        Ok(ProcessOutput {
            exit_code: Some(0),
            stderr: String::new(),
            duration_ms: 1,
        })
    }

    async fn execute_with_progress(
        &self,
        args: &[String],
        total_secs: Option<f64>,
        progress_tx: mpsc::Sender<RenderProgress>,
    ) -> Result<ProcessOutput, RenderError> {
        let output = self.execute(args).await?;
        let _ = progress_tx
            .send(RenderProgress {
                percent: 100.0,
                time_secs: total_secs.unwrap_or(0.0),
                duration_secs: total_secs,
                speed: Some("1.0x".to_string()),
            })
            .await;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_output_and_records_args() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let runner = MockRunner::new();

        let args = vec!["-y".to_string(), output.display().to_string()];
        runner.execute(&args).await.unwrap();

        assert!(output.exists());
        assert_eq!(runner.last_args().await, Some(args));
    }

    #[tokio::test]
    async fn test_queued_errors_are_consumed_in_order() {
        let runner = MockRunner::new();
        runner.push_error(RenderError::Timeout { timeout_secs: 1 }).await;
        runner.set_write_output(false).await;

        assert!(matches!(
            runner.execute(&[]).await,
            Err(RenderError::Timeout { .. })
        ));
        assert!(runner.execute(&[]).await.is_ok());
        assert_eq!(runner.execution_count().await, 2);
    }
}
