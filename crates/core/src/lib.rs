pub mod composer;
pub mod config;
pub mod metrics;
pub mod render;
pub mod testing;

pub use composer::{
    ArtifactStore, ComposerError, FsArtifactStore, HttpSourceFetcher, PreparedVideo,
    PreparedVideoFilter, RecordStore, ScenarioComposer, ScenarioKind, ScenarioRequest,
    SourceFetcher, SqliteRecordStore,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use render::{
    CompiledGraph, MediaInfo, MediaProbe, PipelineOptions, ProcessRunner, RenderConfig,
    RenderEngine, RenderError, RenderResult, VideoPipeline,
};
