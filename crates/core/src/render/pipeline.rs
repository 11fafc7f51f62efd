//! The stateful video pipeline builder.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::RenderConfig;
use super::error::RenderError;
use super::graph::{compile, CompiledGraph, StreamSpec};
use super::ops::{ColorBalance, FilterOp, Geometry, Region};
use super::probe::{FfprobeProbe, MediaProbe};
use super::runner::{FfmpegRunner, ProcessRunner};
use super::types::{RenderProgress, RenderResult};
use crate::metrics;

/// Construction options for a [`VideoPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub width: u32,
    pub height: u32,
    /// Only a master may accept members and run.
    pub is_master: bool,
}

impl PipelineOptions {
    pub fn master(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            is_master: true,
        }
    }

    pub fn member(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            is_master: false,
        }
    }
}

/// The collaborators a pipeline compiles and runs against.
#[derive(Clone)]
pub struct RenderEngine {
    probe: Arc<dyn MediaProbe>,
    runner: Arc<dyn ProcessRunner>,
    config: Arc<RenderConfig>,
}

impl RenderEngine {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        runner: Arc<dyn ProcessRunner>,
        config: RenderConfig,
    ) -> Self {
        Self {
            probe,
            runner,
            config: Arc::new(config),
        }
    }

    /// Engine backed by the ffprobe and ffmpeg binaries named in `config`.
    pub fn ffmpeg(config: RenderConfig) -> Self {
        let probe = Arc::new(FfprobeProbe::new(config.ffprobe_path.clone()));
        let runner = Arc::new(FfmpegRunner::new(
            config.ffmpeg_path.clone(),
            config.timeout_secs,
        ));
        Self::new(probe, runner, config)
    }

    pub fn probe(&self) -> &Arc<dyn MediaProbe> {
        &self.probe
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Starts a new uninitialised pipeline on this engine.
    pub fn pipeline(&self, options: PipelineOptions) -> VideoPipeline {
        VideoPipeline::new(options, self.clone())
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("probe", &self.probe.name())
            .field("runner", &self.runner.name())
            .finish()
    }
}

/// One bound source plus its operation chain and lazily probed facts.
#[derive(Debug, Clone)]
struct PipelineNode {
    input: PathBuf,
    ops: Vec<FilterOp>,
    duration_secs: Option<f64>,
    has_audio: Option<bool>,
}

#[derive(Clone)]
enum Member {
    /// The pipeline was concatenated into itself.
    Itself,
    Other(VideoPipeline),
}

#[derive(Default)]
struct PipelineState {
    node: Option<PipelineNode>,
    members: Vec<Member>,
}

struct PipelineInner {
    geometry: Geometry,
    is_master: bool,
    engine: RenderEngine,
    state: Mutex<PipelineState>,
}

/// A fluent filter-graph builder bound to one input.
///
/// Handles are cheap to clone and share state: attaching a pipeline to a
/// master through [`concat`](Self::concat) stores a reference, so later
/// operations on the member are visible when the master compiles.
///
/// Mutators are synchronous and expect a single writer per pipeline.
///
/// # Example
///
/// ```ignore
/// let engine = RenderEngine::ffmpeg(RenderConfig::default());
/// let master = engine.pipeline(PipelineOptions::master(1080, 1920));
/// master.init("/work/source.mp4")?.color_adjust()?.rotate(1)?;
///
/// let banner = engine.pipeline(PipelineOptions::member(1080, 1920));
/// banner.init("/work/banner.mp4")?;
///
/// master.concat(&banner)?;
/// master.run("/work/out.mp4").await?;
/// ```
#[derive(Clone)]
pub struct VideoPipeline {
    inner: Arc<PipelineInner>,
}

impl std::fmt::Debug for VideoPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("VideoPipeline")
            .field("geometry", &self.inner.geometry)
            .field("is_master", &self.inner.is_master)
            .field("input", &state.node.as_ref().map(|n| n.input.clone()))
            .field("ops", &state.node.as_ref().map(|n| n.ops.len()))
            .field("members", &state.members.len())
            .finish()
    }
}

impl VideoPipeline {
    /// Creates an uninitialised pipeline.
    pub fn new(options: PipelineOptions, engine: RenderEngine) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                geometry: Geometry::new(options.width, options.height),
                is_master: options.is_master,
                engine,
                state: Mutex::new(PipelineState::default()),
            }),
        }
    }

    pub fn is_master(&self) -> bool {
        self.inner.is_master
    }

    pub fn geometry(&self) -> Geometry {
        self.inner.geometry
    }

    /// Bound input path, if `init` was called.
    pub fn input(&self) -> Option<PathBuf> {
        self.inner.state.lock().node.as_ref().map(|n| n.input.clone())
    }

    /// Operations appended so far, in order.
    pub fn ops(&self) -> Vec<FilterOp> {
        self.inner
            .state
            .lock()
            .node
            .as_ref()
            .map(|n| n.ops.clone())
            .unwrap_or_default()
    }

    fn same_as(&self, other: &VideoPipeline) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Binds the primary source. Allowed once.
    pub fn init(&self, input: impl AsRef<Path>) -> Result<&Self, RenderError> {
        let input = input.as_ref();
        let mut state = self.inner.state.lock();
        if let Some(ref node) = state.node {
            return Err(RenderError::invalid_state(format!(
                "pipeline already bound to {}",
                node.input.display()
            )));
        }
        state.node = Some(PipelineNode {
            input: input.to_path_buf(),
            ops: Vec::new(),
            duration_secs: None,
            has_audio: None,
        });
        debug!(input = %input.display(), "Pipeline bound");
        Ok(self)
    }

    fn push_op(&self, op: FilterOp) -> Result<&Self, RenderError> {
        let mut state = self.inner.state.lock();
        let node = state.node.as_mut().ok_or_else(|| {
            RenderError::invalid_state(format!("{} called before init", op.name()))
        })?;
        node.ops.push(op);
        Ok(self)
    }

    /// Applies the default colour balance.
    pub fn color_adjust(&self) -> Result<&Self, RenderError> {
        self.push_op(FilterOp::ColorAdjust(ColorBalance::default()))
    }

    /// Applies a custom colour balance.
    pub fn color_adjust_with(&self, balance: ColorBalance) -> Result<&Self, RenderError> {
        self.push_op(FilterOp::ColorAdjust(balance))
    }

    /// Rotates clockwise by `quarter_turns` (negative turns rotate counter-clockwise).
    pub fn rotate(&self, quarter_turns: i32) -> Result<&Self, RenderError> {
        self.push_op(FilterOp::Rotate { quarter_turns })
    }

    /// Draws `image` scaled into `region`.
    pub fn overlay(&self, image: impl AsRef<Path>, region: Region) -> Result<&Self, RenderError> {
        self.ensure_bound("overlay")?;
        let region = region.validate()?;
        self.push_op(FilterOp::Overlay {
            image: image.as_ref().to_path_buf(),
            region,
        })
    }

    /// Keeps `duration_secs` seconds starting at `start_secs`.
    pub fn trim(&self, start_secs: f64, duration_secs: f64) -> Result<&Self, RenderError> {
        self.ensure_bound("trim")?;
        self.push_op(FilterOp::trim(start_secs, duration_secs)?)
    }

    /// Replaces the audio track with silence of the stream's length.
    pub fn inject_silent_audio(&self) -> Result<&Self, RenderError> {
        self.push_op(FilterOp::SilentAudio)
    }

    /// Rescales and pads the frame to `width`x`height` at this point in the chain.
    ///
    /// The output frame stays at the master geometry: a smaller picture is
    /// letterboxed inside it, a larger one is scaled back down.
    pub fn target_geometry(&self, width: u32, height: u32) -> Result<&Self, RenderError> {
        self.ensure_bound("target_geometry")?;
        let geometry = Geometry::new(width, height).validate()?;
        self.push_op(FilterOp::TargetGeometry(geometry))
    }

    /// Attaches `other` after the streams already attached. Master only.
    ///
    /// Attaching a pipeline to itself is allowed and yields the same source
    /// twice. Attaching a pipeline that already reaches this one is rejected,
    /// so member links never form a cycle.
    pub fn concat(&self, other: &VideoPipeline) -> Result<&Self, RenderError> {
        if !self.inner.is_master {
            return Err(RenderError::invalid_state(
                "concat is only allowed on a master pipeline",
            ));
        }
        self.ensure_bound("concat")?;

        if self.same_as(other) {
            self.inner.state.lock().members.push(Member::Itself);
        } else {
            other.ensure_bound("concat")?;
            if other.reaches(&self.inner) {
                return Err(RenderError::invalid_state(
                    "attaching would create a cycle of pipelines",
                ));
            }
            if other.geometry() != self.geometry() {
                debug!(
                    member = ?other.geometry(),
                    master = ?self.geometry(),
                    "Member geometry differs, master geometry wins"
                );
            }
            self.inner
                .state
                .lock()
                .members
                .push(Member::Other(other.clone()));
        }
        Ok(self)
    }

    fn ensure_bound(&self, operation: &str) -> Result<(), RenderError> {
        if self.inner.state.lock().node.is_none() {
            return Err(RenderError::invalid_state(format!(
                "{} called before init",
                operation
            )));
        }
        Ok(())
    }

    fn ensure_master(&self, operation: &str) -> Result<(), RenderError> {
        if !self.inner.is_master {
            return Err(RenderError::invalid_state(format!(
                "{} is only allowed on a master pipeline",
                operation
            )));
        }
        Ok(())
    }

    /// Whether `target` is attached, directly or transitively, below self.
    fn reaches(&self, target: &Arc<PipelineInner>) -> bool {
        let members = self.inner.state.lock().members.clone();
        members.iter().any(|member| match member {
            Member::Itself => false,
            Member::Other(pipeline) => {
                Arc::ptr_eq(&pipeline.inner, target) || pipeline.reaches(target)
            }
        })
    }

    /// Collects self and members, pre-order, into `out`.
    fn flatten_into(&self, out: &mut Vec<VideoPipeline>) -> Result<(), RenderError> {
        let members = {
            let state = self.inner.state.lock();
            if state.node.is_none() {
                return Err(RenderError::invalid_state(
                    "attached pipeline was never initialised",
                ));
            }
            state.members.clone()
        };

        out.push(self.clone());
        for member in members {
            match member {
                Member::Itself => out.push(self.clone()),
                Member::Other(pipeline) => pipeline.flatten_into(out)?,
            }
        }
        Ok(())
    }

    /// Streams in compile order: self first, then members in attachment order.
    fn flatten(&self) -> Result<Vec<VideoPipeline>, RenderError> {
        let mut out = Vec::new();
        self.flatten_into(&mut out)?;
        Ok(out)
    }

    /// Snapshot of this pipeline's node with probed facts filled in.
    async fn stream_spec(&self) -> Result<StreamSpec, RenderError> {
        let node = self
            .inner
            .state
            .lock()
            .node
            .clone()
            .ok_or_else(|| RenderError::invalid_state("pipeline was never initialised"))?;

        let probe = self.inner.engine.probe();
        let duration_secs = match node.duration_secs {
            Some(d) => d,
            None => probe.duration(&node.input).await?,
        };
        let has_audio = match node.has_audio {
            Some(a) => a,
            None => probe.has_audio(&node.input).await?,
        };

        if node.duration_secs.is_none() || node.has_audio.is_none() {
            let mut state = self.inner.state.lock();
            if let Some(cached) = state.node.as_mut() {
                cached.duration_secs = Some(duration_secs);
                cached.has_audio = Some(has_audio);
            }
        }

        Ok(StreamSpec {
            input: node.input,
            ops: node.ops,
            has_audio,
            duration_secs,
        })
    }

    /// Compiles the current state without running anything.
    ///
    /// Probes each distinct source once and caches the result; the returned
    /// graph is exactly what [`run`](Self::run) would submit if called next.
    pub async fn complex_filters(&self) -> Result<CompiledGraph, RenderError> {
        self.ensure_bound("complex_filters")?;
        let pipelines = self.flatten()?;
        let mut specs = Vec::with_capacity(pipelines.len());
        for pipeline in &pipelines {
            specs.push(pipeline.stream_spec().await?);
        }
        compile(&specs, self.inner.geometry)
    }

    /// Compiles and runs the graph, writing `output`.
    ///
    /// On failure `output` is removed before the error is returned.
    pub async fn run(&self, output: impl AsRef<Path>) -> Result<RenderResult, RenderError> {
        self.run_inner(output.as_ref(), None).await
    }

    /// Like [`run`](Self::run), reporting progress on `progress_tx`.
    pub async fn run_with_progress(
        &self,
        output: impl AsRef<Path>,
        progress_tx: mpsc::Sender<RenderProgress>,
    ) -> Result<RenderResult, RenderError> {
        self.run_inner(output.as_ref(), Some(progress_tx)).await
    }

    async fn run_inner(
        &self,
        output: &Path,
        progress_tx: Option<mpsc::Sender<RenderProgress>>,
    ) -> Result<RenderResult, RenderError> {
        self.ensure_master("run")?;
        self.ensure_bound("run")?;

        let start = Instant::now();
        let result = self.compile_and_execute(output, progress_tx).await;

        match result {
            Ok(result) => {
                metrics::RENDERS.with_label_values(&["success"]).inc();
                metrics::RENDER_DURATION
                    .with_label_values(&["success"])
                    .observe(start.elapsed().as_secs_f64());
                Ok(result)
            }
            Err(e) => {
                metrics::RENDERS.with_label_values(&["failed"]).inc();
                metrics::RENDER_DURATION
                    .with_label_values(&["failed"])
                    .observe(start.elapsed().as_secs_f64());
                remove_output(output).await;
                Err(e)
            }
        }
    }

    async fn compile_and_execute(
        &self,
        output: &Path,
        progress_tx: Option<mpsc::Sender<RenderProgress>>,
    ) -> Result<RenderResult, RenderError> {
        let start = Instant::now();
        let engine = &self.inner.engine;
        let graph = self.complex_filters().await?;
        let args = graph.to_args(output, engine.config());
        metrics::STREAMS_PER_RENDER
            .with_label_values(&[])
            .observe(graph.streams as f64);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!(
            streams = graph.streams,
            inputs = graph.inputs.len(),
            output = %output.display(),
            "Starting render"
        );
        debug!(filter_graph = %graph.filter_graph, "Compiled filter graph");

        match progress_tx {
            Some(tx) => {
                engine
                    .runner
                    .execute_with_progress(&args, Some(graph.duration_secs), tx)
                    .await?
            }
            None => engine.runner.execute(&args).await?,
        };

        let meta = tokio::fs::metadata(output).await.map_err(|_| {
            RenderError::process_failed(Some(0), "transcoder exited cleanly but wrote no output")
        })?;

        info!(
            output = %output.display(),
            size_bytes = meta.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Render finished"
        );

        Ok(RenderResult {
            output_path: output.to_path_buf(),
            output_size_bytes: meta.len(),
            streams: graph.streams,
            duration_secs: graph.duration_secs,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn remove_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(output = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), error = %e, "Failed to remove partial output"),
    }
}
