//! External transcoder execution.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::error::RenderError;
use super::types::{ProcessOutput, RenderProgress};

/// Runs the external transcoder with a prepared argument list.
///
/// Each call spawns exactly one process and never retries.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the transcoder and waits for it to exit.
    async fn execute(&self, args: &[String]) -> Result<ProcessOutput, RenderError>;

    /// Runs the transcoder, reporting progress against `total_secs`.
    ///
    /// If the receiver is dropped, execution continues without progress reporting.
    async fn execute_with_progress(
        &self,
        args: &[String],
        _total_secs: Option<f64>,
        _progress_tx: mpsc::Sender<RenderProgress>,
    ) -> Result<ProcessOutput, RenderError> {
        self.execute(args).await
    }
}

/// Spawns ffmpeg as a child process.
pub struct FfmpegRunner {
    ffmpeg_path: PathBuf,
    timeout_secs: u64,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_path: PathBuf, timeout_secs: u64) -> Self {
        Self {
            ffmpeg_path,
            timeout_secs,
        }
    }

    async fn run(
        &self,
        args: &[String],
        total_secs: Option<f64>,
        progress_tx: Option<mpsc::Sender<RenderProgress>>,
    ) -> Result<ProcessOutput, RenderError> {
        let start = Instant::now();

        let mut command = Command::new(&self.ffmpeg_path);
        if progress_tx.is_some() {
            command.args(["-progress", "pipe:2", "-nostats"]);
        }
        let mut child = command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::BinaryNotFound {
                        path: self.ffmpeg_path.clone(),
                    }
                } else {
                    RenderError::Io(e)
                }
            })?;

        debug!(pid = child.id(), args = args.len(), "Spawned transcoder");

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::Io(std::io::Error::other("stderr not captured")))?;
        let mut reader = BufReader::new(stderr).lines();

        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=\s*(\d+\.?\d*)x").ok();

        let timeout_duration = Duration::from_secs(self.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut diagnostics = String::new();
            let mut current_time = 0.0;
            let mut current_speed = None;
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);

            while let Some(line) = reader.next_line().await? {
                let Some(ref tx) = progress_tx else {
                    diagnostics.push_str(&line);
                    diagnostics.push('\n');
                    continue;
                };

                // Progress key=value lines are not diagnostics.
                let mut is_progress = false;
                if let Some(caps) = time_regex.as_ref().and_then(|re| re.captures(&line)) {
                    if let Ok(us) = caps[1].parse::<f64>() {
                        current_time = us / 1_000_000.0;
                    }
                    is_progress = true;
                }
                if let Some(caps) = speed_regex.as_ref().and_then(|re| re.captures(&line)) {
                    current_speed = Some(format!("{}x", &caps[1]));
                    is_progress = true;
                }
                if is_progress || (line.contains('=') && !line.contains(' ')) {
                    if last_progress_send.elapsed() >= progress_interval {
                        let percent = match total_secs {
                            Some(total) if total > 0.0 => {
                                (current_time / total * 100.0).min(100.0) as f32
                            }
                            _ => 0.0,
                        };
                        let _ = tx.try_send(RenderProgress {
                            percent,
                            time_secs: current_time,
                            duration_secs: total_secs,
                            speed: current_speed.clone(),
                        });
                        last_progress_send = Instant::now();
                    }
                } else {
                    diagnostics.push_str(&line);
                    diagnostics.push('\n');
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, diagnostics))
        })
        .await;

        match result {
            Ok(Ok((status, diagnostics))) => {
                if !status.success() {
                    warn!(
                        exit_code = ?status.code(),
                        "Transcoder exited with failure"
                    );
                    return Err(RenderError::process_failed(status.code(), diagnostics));
                }
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    stderr: diagnostics,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(RenderError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(RenderError::Timeout {
                    timeout_secs: self.timeout_secs,
                })
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn execute(&self, args: &[String]) -> Result<ProcessOutput, RenderError> {
        self.run(args, None, None).await
    }

    async fn execute_with_progress(
        &self,
        args: &[String],
        total_secs: Option<f64>,
        progress_tx: mpsc::Sender<RenderProgress>,
    ) -> Result<ProcessOutput, RenderError> {
        self.run(args, total_secs, Some(progress_tx)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_execute_success_captures_stderr() {
        let runner = FfmpegRunner::new(PathBuf::from("sh"), 10);
        let output = runner.execute(&sh("echo working >&2")).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stderr.contains("working"));
    }

    #[tokio::test]
    async fn test_execute_failure_returns_diagnostics() {
        let runner = FfmpegRunner::new(PathBuf::from("sh"), 10);
        let err = runner
            .execute(&sh("echo 'Invalid filter graph' >&2; exit 3"))
            .await
            .unwrap_err();

        match err {
            RenderError::ProcessFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("Invalid filter graph"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_binary() {
        let runner = FfmpegRunner::new(PathBuf::from("nonexistent_ffmpeg_xyz_12345"), 10);
        let err = runner.execute(&[]).await.unwrap_err();
        assert!(matches!(err, RenderError::BinaryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let runner = FfmpegRunner::new(PathBuf::from("sleep"), 0);
        let err = runner.execute(&["5".to_string()]).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout { timeout_secs: 0 }));
    }
}
