//! Fixed pipeline layouts for each scenario kind.

use std::path::PathBuf;

use super::types::ScenarioKind;
use crate::render::{normalize_turns, PipelineOptions, RenderEngine, RenderError, VideoPipeline};

/// Builds the master pipeline for `kind` over its downloaded sources.
///
/// `sources` holds local paths in the order of [`ScenarioKind::sources`].
pub fn build_pipeline(
    kind: &ScenarioKind,
    engine: &RenderEngine,
    sources: &[PathBuf],
) -> Result<VideoPipeline, RenderError> {
    let expected = kind.sources().len();
    if sources.len() != expected {
        return Err(RenderError::invalid_argument(format!(
            "{} needs {} sources, got {}",
            kind.name(),
            expected,
            sources.len()
        )));
    }

    let config = engine.config();
    let master = engine.pipeline(PipelineOptions::master(config.width, config.height));

    match kind {
        ScenarioKind::BannerAppend { .. } => {
            master.init(&sources[0])?.color_adjust()?;

            let banner = engine.pipeline(PipelineOptions::member(config.width, config.height));
            banner.init(&sources[1])?;
            master.concat(&banner)?;
        }
        ScenarioKind::CoverWithImage {
            region,
            max_duration_secs,
            ..
        } => {
            master
                .init(&sources[0])?
                .trim(0.0, *max_duration_secs)?
                .overlay(&sources[1], *region)?;
        }
        ScenarioKind::Shortify {
            start_secs,
            max_duration_secs,
            quarter_turns,
            ..
        } => {
            master.init(&sources[0])?.trim(*start_secs, *max_duration_secs)?;
            if normalize_turns(*quarter_turns) != 0 {
                master.rotate(*quarter_turns)?;
            }
            master.color_adjust()?;
        }
    }

    Ok(master)
}
