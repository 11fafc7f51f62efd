//! Video filter-graph compiler.
//!
//! A [`VideoPipeline`] accumulates filter operations against one source and
//! can absorb other pipelines through `concat`. Running the master compiles
//! every attached stream into a single `-filter_complex` expression and hands
//! the resulting argument list to a [`ProcessRunner`] exactly once.
//!
//! # Architecture
//!
//! ```text
//! VideoPipeline (builder state)
//!     │ flatten + probe
//!     ▼
//! graph::compile ──► CompiledGraph ──► to_args ──► ProcessRunner (ffmpeg)
//!     ▲
//! MediaProbe (ffprobe)
//! ```

mod config;
mod error;
pub mod graph;
mod ops;
mod pipeline;
mod probe;
mod runner;
mod types;

pub use config::{EncodingConfig, RenderConfig};
pub use error::RenderError;
pub use graph::{compile, CompiledGraph, StreamSpec};
pub use ops::{normalize_turns, ColorBalance, FilterOp, Geometry, Region};
pub use pipeline::{PipelineOptions, RenderEngine, VideoPipeline};
pub use probe::{FfprobeProbe, MediaProbe};
pub use runner::{FfmpegRunner, ProcessRunner};
pub use types::{MediaInfo, ProcessOutput, RenderProgress, RenderResult};
