//! Scenario composer: fetch, compile, render, publish, record.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::config::{ComposerConfig, FetchConfig, RetryConfig};
use super::error::{ComposerError, FetchError};
use super::fetch::url_extension;
use super::scenarios::build_pipeline;
use super::traits::{ArtifactStore, RecordStore, SourceFetcher};
use super::types::{ComposeOutcome, PreparedVideo, ScenarioRequest, SourceRef};
use super::workspace::JobWorkspace;
use crate::metrics;
use crate::render::{RenderEngine, RenderError, RenderResult, VideoPipeline};

/// Runs scenario requests end to end.
///
/// Each job gets its own [`JobWorkspace`], removed whether the job succeeds
/// or fails. Renders across all jobs share one concurrency limit.
pub struct ScenarioComposer<F, A, R>
where
    F: SourceFetcher,
    A: ArtifactStore,
    R: RecordStore,
{
    engine: RenderEngine,
    fetcher: Arc<F>,
    artifacts: Arc<A>,
    records: Arc<R>,
    config: ComposerConfig,
    fetch_config: FetchConfig,
    workspace_root: PathBuf,
    render_semaphore: Arc<Semaphore>,
}

impl<F, A, R> ScenarioComposer<F, A, R>
where
    F: SourceFetcher + 'static,
    A: ArtifactStore + 'static,
    R: RecordStore + 'static,
{
    pub fn new(
        engine: RenderEngine,
        fetcher: Arc<F>,
        artifacts: Arc<A>,
        records: Arc<R>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        let config = ComposerConfig::default();
        let render_semaphore = Arc::new(Semaphore::new(config.max_parallel_renders));
        Self {
            engine,
            fetcher,
            artifacts,
            records,
            config,
            fetch_config: FetchConfig::default(),
            workspace_root: workspace_root.into(),
            render_semaphore,
        }
    }

    /// Replaces the composer settings, resizing the render limit.
    pub fn with_config(mut self, config: ComposerConfig) -> Self {
        self.render_semaphore = Arc::new(Semaphore::new(config.max_parallel_renders.max(1)));
        self.config = config;
        self
    }

    pub fn with_fetch_config(mut self, fetch_config: FetchConfig) -> Self {
        self.fetch_config = fetch_config;
        self
    }

    pub fn records(&self) -> &Arc<R> {
        &self.records
    }

    /// Runs one job.
    pub async fn compose(&self, request: ScenarioRequest) -> Result<ComposeOutcome, ComposerError> {
        let scenario = request.scenario.name();
        if let Err(e) = request.validate() {
            warn!(job_id = %request.job_id, scenario, error = %e, "Rejected scenario request");
            metrics::COMPOSER_JOBS
                .with_label_values(&[scenario, "rejected"])
                .inc();
            return Err(e);
        }

        let start = Instant::now();
        info!(
            job_id = %request.job_id,
            scenario,
            accounts = request.accounts.len(),
            "Starting composer job"
        );

        let workspace = JobWorkspace::create(&self.workspace_root, &request.job_id).await?;
        let result = self.compose_in(&request, &workspace, start).await;
        workspace.remove().await;

        match &result {
            Ok(outcome) => {
                metrics::COMPOSER_JOBS
                    .with_label_values(&[scenario, "success"])
                    .inc();
                info!(
                    job_id = %request.job_id,
                    url = %outcome.record.url,
                    elapsed_ms = outcome.elapsed_ms,
                    "Composer job finished"
                );
            }
            Err(e) => {
                metrics::COMPOSER_JOBS
                    .with_label_values(&[scenario, "failed"])
                    .inc();
                warn!(
                    job_id = %request.job_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Composer job failed"
                );
            }
        }
        result
    }

    async fn compose_in(
        &self,
        request: &ScenarioRequest,
        workspace: &JobWorkspace,
        start: Instant,
    ) -> Result<ComposeOutcome, ComposerError> {
        let sources = self.download_all(request, workspace).await?;

        let master = build_pipeline(&request.scenario, &self.engine, &sources)?;
        let output = workspace.file("output.mp4");
        let render = self.render_with_retry(&request.job_id, &master, &output).await?;

        let remote_name = format!("{}.mp4", request.job_id);
        let stored = match self.artifacts.upload(&output, &remote_name).await {
            Ok(stored) => {
                metrics::UPLOADS.with_label_values(&["success"]).inc();
                stored
            }
            Err(e) => {
                metrics::UPLOADS.with_label_values(&["failed"]).inc();
                return Err(e.into());
            }
        };

        let record = PreparedVideo {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: request.job_id.clone(),
            scenario: request.scenario.name().to_string(),
            accounts: request.accounts.clone(),
            caption: request.caption.clone(),
            url: stored.url,
            size_bytes: stored.size_bytes,
            checksum: stored.checksum,
            duration_secs: render.duration_secs,
            created_at: Utc::now(),
        };
        self.records.add_prepared_video(&record)?;

        Ok(ComposeOutcome {
            record,
            render,
            sources,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Downloads every source in parallel, keeping scenario order.
    async fn download_all(
        &self,
        request: &ScenarioRequest,
        workspace: &JobWorkspace,
    ) -> Result<Vec<PathBuf>, ComposerError> {
        let targets: Vec<(SourceRef, PathBuf)> = request
            .scenario
            .sources()
            .into_iter()
            .enumerate()
            .map(|(i, source)| {
                let ext = url_extension(&source.url)
                    .unwrap_or_else(|| source.fallback_extension.to_string());
                let path = workspace.file(&format!("{:02}_{}.{}", i, source.role, ext));
                (source, path)
            })
            .collect();

        let limit = self.fetch_config.max_parallel_downloads.max(1);
        let paths = stream::iter(targets)
            .map(|(source, path)| async move {
                self.fetch_with_retry(&request.job_id, &source.url, &path)
                    .await
            })
            .buffered(limit)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(paths)
    }

    async fn fetch_with_retry(
        &self,
        job_id: &str,
        url: &str,
        path: &Path,
    ) -> Result<PathBuf, FetchError> {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            match self.fetcher.save_file_to_disk(url, path).await {
                Ok(saved) => {
                    metrics::DOWNLOADS.with_label_values(&["success"]).inc();
                    return Ok(saved);
                }
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    warn!(job_id, url, attempt, error = %e, "Download failed, retrying");
                    metrics::RETRY_ATTEMPTS.with_label_values(&["download"]).inc();
                    tokio::time::sleep(retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    metrics::DOWNLOADS.with_label_values(&["failed"]).inc();
                    return Err(e);
                }
            }
        }
    }

    async fn render_with_retry(
        &self,
        job_id: &str,
        master: &VideoPipeline,
        output: &Path,
    ) -> Result<RenderResult, RenderError> {
        let retry: &RetryConfig = &self.config.retry;
        let mut attempt = 1;
        loop {
            let result = {
                let _permit = self
                    .render_semaphore
                    .acquire()
                    .await
                    .map_err(|_| RenderError::invalid_state("render pool closed"))?;
                metrics::ACTIVE_RENDERS.inc();
                let result = master.run(output).await;
                metrics::ACTIVE_RENDERS.dec();
                result
            };

            match result {
                Ok(render) => return Ok(render),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    warn!(job_id, attempt, error = %e, "Render failed, retrying");
                    metrics::RETRY_ATTEMPTS.with_label_values(&["render"]).inc();
                    tokio::time::sleep(retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
