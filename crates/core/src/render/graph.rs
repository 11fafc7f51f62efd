//! Filter-graph compilation.
//!
//! Turns an ordered list of streams (one input plus its op chain each) into a
//! single `-filter_complex` expression and the argument vector for one ffmpeg
//! invocation. Compilation is pure: probed facts are resolved by the caller and
//! passed in through [`StreamSpec`].

use std::path::{Path, PathBuf};

use super::config::RenderConfig;
use super::error::RenderError;
use super::ops::{normalize_turns, FilterOp, Geometry, Region};

const SAMPLE_RATE: u32 = 44100;
const CHANNEL_LAYOUT: &str = "stereo";

/// One stream to compile, with its probed facts.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    /// Source media path.
    pub input: PathBuf,
    /// Operation chain in insertion order.
    pub ops: Vec<FilterOp>,
    /// Whether the source carries an audio stream.
    pub has_audio: bool,
    /// Probed source duration in seconds (0.0 when unknown).
    pub duration_secs: f64,
}

/// A compiled filter graph, ready to be turned into ffmpeg arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    /// Input files in `-i` order.
    pub inputs: Vec<PathBuf>,
    /// The `-filter_complex` expression.
    pub filter_graph: String,
    /// Label of the final video pad.
    pub video_label: String,
    /// Label of the final audio pad, if the output has audio.
    pub audio_label: Option<String>,
    /// Number of streams combined.
    pub streams: usize,
    /// Expected output duration in seconds.
    pub duration_secs: f64,
}

impl CompiledGraph {
    /// Number of concatenation nodes in the graph (0 or 1).
    pub fn concat_nodes(&self) -> usize {
        self.filter_graph.matches("concat=n=").count()
    }

    /// Builds the full ffmpeg argument vector writing to `output`.
    pub fn to_args(&self, output: &Path, config: &RenderConfig) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            config.ffmpeg_log_level.clone(),
        ];

        for input in &self.inputs {
            args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);
        }

        args.extend(["-filter_complex".to_string(), self.filter_graph.clone()]);
        args.extend(["-map".to_string(), format!("[{}]", self.video_label)]);
        if let Some(ref audio) = self.audio_label {
            args.extend(["-map".to_string(), format!("[{}]", audio)]);
        }

        args.extend(config.encoding.to_ffmpeg_args(self.audio_label.is_some()));
        args.extend(config.extra_ffmpeg_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());

        args
    }
}

/// Where a compiled stream's audio comes from.
#[derive(Debug, Clone, PartialEq)]
enum AudioSource {
    /// Source audio with the accumulated trim filters.
    Source { input: usize, filters: Vec<String> },
    /// Generated silence.
    Silence,
    /// No audio at all.
    Absent,
}

#[derive(Debug)]
struct CompiledStream {
    video_label: String,
    audio: AudioSource,
    duration_secs: f64,
}

/// Writes one stream's video chain, splitting it into statements whenever a
/// second input (an overlay image) has to be joined in.
struct ChainWriter<'a> {
    stream: usize,
    segment: usize,
    input_label: String,
    filters: Vec<String>,
    statements: &'a mut Vec<String>,
}

impl<'a> ChainWriter<'a> {
    fn new(stream: usize, input_label: String, statements: &'a mut Vec<String>) -> Self {
        Self {
            stream,
            segment: 0,
            input_label,
            filters: Vec::new(),
            statements,
        }
    }

    fn push(&mut self, filter: String) {
        self.filters.push(filter);
    }

    /// Closes the pending filters into a labelled pad and returns its label.
    fn close_segment(&mut self) -> String {
        if self.filters.is_empty() {
            return self.input_label.clone();
        }
        let label = format!("v{}_{}", self.stream, self.segment);
        self.segment += 1;
        self.statements.push(format!(
            "[{}]{}[{}]",
            self.input_label,
            self.filters.join(","),
            label
        ));
        self.filters.clear();
        label
    }

    fn overlay(&mut self, image_input: usize, region: &Region) {
        let base = self.close_segment();
        let image_label = format!("ov{}_{}", self.stream, self.segment);
        self.statements.push(format!(
            "[{}:v]scale={}:{}[{}]",
            image_input, region.width, region.height, image_label
        ));
        let out = format!("v{}_{}", self.stream, self.segment);
        self.segment += 1;
        self.statements.push(format!(
            "[{}][{}]overlay=x={}:y={}[{}]",
            base, image_label, region.left, region.top, out
        ));
        self.input_label = out;
    }

    fn finish(mut self) -> String {
        if self.filters.is_empty() {
            return self.input_label;
        }
        let label = format!("v{}", self.stream);
        self.statements.push(format!(
            "[{}]{}[{}]",
            self.input_label,
            self.filters.join(","),
            label
        ));
        label
    }
}

fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

fn normalize_filter(geometry: Geometry) -> String {
    let (w, h) = (geometry.width, geometry.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
    )
}

/// Centres an already-fitting frame inside `geometry` without rescaling.
fn letterbox_filter(geometry: Geometry) -> String {
    let (w, h) = (geometry.width, geometry.height);
    format!("pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1")
}

fn rotation_filter(turns: u8) -> Option<&'static str> {
    match turns {
        1 => Some("transpose=1"),
        2 => Some("hflip,vflip"),
        3 => Some("transpose=2"),
        _ => None,
    }
}

fn audio_format_filter() -> String {
    format!(
        "aformat=sample_rates={}:channel_layouts={}",
        SAMPLE_RATE, CHANNEL_LAYOUT
    )
}

fn silence_source(duration_secs: f64) -> String {
    format!(
        "anullsrc=channel_layout={}:sample_rate={},atrim=duration={}",
        CHANNEL_LAYOUT,
        SAMPLE_RATE,
        secs(duration_secs)
    )
}

/// Folds a run of consecutive rotations into one filter.
fn flush_rotation(chain: &mut ChainWriter<'_>, frame: &mut Geometry, pending: &mut i32) {
    let turns = normalize_turns(*pending);
    *pending = 0;
    if let Some(filter) = rotation_filter(turns) {
        chain.push(filter.to_string());
        if turns % 2 == 1 {
            *frame = frame.transposed();
        }
    }
}

fn compile_stream(
    index: usize,
    spec: &StreamSpec,
    geometry: Geometry,
    inputs: &mut Vec<PathBuf>,
    statements: &mut Vec<String>,
) -> Result<CompiledStream, RenderError> {
    let input = inputs.len();
    inputs.push(spec.input.clone());

    let mut chain = ChainWriter::new(index, format!("{}:v", input), statements);
    chain.push(normalize_filter(geometry));

    let mut frame = geometry;
    let mut pending_turns = 0i32;
    let mut audio_filters = Vec::new();
    let mut silent = false;
    let mut duration = spec.duration_secs.max(0.0);

    for op in &spec.ops {
        if let FilterOp::Rotate { quarter_turns } = op {
            pending_turns = pending_turns.wrapping_add(*quarter_turns);
            continue;
        }
        flush_rotation(&mut chain, &mut frame, &mut pending_turns);

        match op {
            FilterOp::ColorAdjust(balance) => chain.push(format!(
                "eq=brightness={:.3}:contrast={:.3}:saturation={:.3}",
                balance.brightness, balance.contrast, balance.saturation
            )),
            FilterOp::Overlay { image, region } => {
                let image_input = inputs.len();
                inputs.push(image.clone());
                chain.overlay(image_input, region);
            }
            FilterOp::Trim {
                start_secs,
                duration_secs,
            } => {
                if duration > 0.0 && *start_secs >= duration {
                    return Err(RenderError::invalid_argument(format!(
                        "trim of {} starts at {}s but only {}s remain",
                        spec.input.display(),
                        secs(*start_secs),
                        secs(duration)
                    )));
                }
                chain.push(format!(
                    "trim=start={}:duration={},setpts=PTS-STARTPTS",
                    secs(*start_secs),
                    secs(*duration_secs)
                ));
                audio_filters.push(format!(
                    "atrim=start={}:duration={},asetpts=PTS-STARTPTS",
                    secs(*start_secs),
                    secs(*duration_secs)
                ));
                duration = if duration > 0.0 {
                    (duration - start_secs).max(0.0).min(*duration_secs)
                } else {
                    *duration_secs
                };
            }
            FilterOp::SilentAudio => silent = true,
            FilterOp::TargetGeometry(target) => {
                chain.push(normalize_filter(*target));
                frame = *target;
            }
            FilterOp::Rotate { .. } => {}
        }
    }
    flush_rotation(&mut chain, &mut frame, &mut pending_turns);

    // Odd rotations and explicit resizes leave the frame off-target. A frame
    // that already fits is padded, never scaled back up.
    if frame != geometry {
        if frame.width <= geometry.width && frame.height <= geometry.height {
            chain.push(letterbox_filter(geometry));
        } else {
            chain.push(normalize_filter(geometry));
        }
    }

    let video_label = chain.finish();
    let audio = if silent {
        AudioSource::Silence
    } else if spec.has_audio {
        AudioSource::Source {
            input,
            filters: audio_filters,
        }
    } else {
        AudioSource::Absent
    };

    Ok(CompiledStream {
        video_label,
        audio,
        duration_secs: duration,
    })
}

/// Writes the audio statement for one stream and returns its label.
fn write_audio(
    index: usize,
    audio: &AudioSource,
    duration_secs: f64,
    statements: &mut Vec<String>,
) -> Option<String> {
    let label = format!("a{}", index);
    match audio {
        AudioSource::Source { input, filters } => {
            let mut chain = filters.clone();
            chain.push(audio_format_filter());
            statements.push(format!("[{}:a]{}[{}]", input, chain.join(","), label));
        }
        AudioSource::Silence => {
            statements.push(format!(
                "{},{}[{}]",
                silence_source(duration_secs),
                audio_format_filter(),
                label
            ));
        }
        AudioSource::Absent => return None,
    }
    Some(label)
}

/// Compiles streams, in order, into one filter graph normalised to `geometry`.
pub fn compile(streams: &[StreamSpec], geometry: Geometry) -> Result<CompiledGraph, RenderError> {
    if streams.is_empty() {
        return Err(RenderError::invalid_state("no streams to compile"));
    }
    let geometry = geometry.validate()?;

    let mut inputs = Vec::new();
    let mut statements = Vec::new();
    let compiled: Vec<CompiledStream> = streams
        .iter()
        .enumerate()
        .map(|(i, spec)| compile_stream(i, spec, geometry, &mut inputs, &mut statements))
        .collect::<Result<_, _>>()?;

    let duration_secs = compiled.iter().map(|s| s.duration_secs).sum();

    if let [single] = compiled.as_slice() {
        let audio_label = write_audio(0, &single.audio, single.duration_secs, &mut statements);
        return Ok(CompiledGraph {
            inputs,
            filter_graph: statements.join(";"),
            video_label: single.video_label.clone(),
            audio_label,
            streams: 1,
            duration_secs,
        });
    }

    // concat needs an audio pad from every segment once any has one.
    let mut pads = String::new();
    for (i, stream) in compiled.iter().enumerate() {
        let audio = match &stream.audio {
            AudioSource::Absent => AudioSource::Silence,
            other => other.clone(),
        };
        let label = write_audio(i, &audio, stream.duration_secs, &mut statements)
            .unwrap_or_else(|| format!("a{}", i));
        pads.push_str(&format!("[{}][{}]", stream.video_label, label));
    }
    statements.push(format!(
        "{}concat=n={}:v=1:a=1[outv][outa]",
        pads,
        compiled.len()
    ));

    Ok(CompiledGraph {
        inputs,
        filter_graph: statements.join(";"),
        video_label: "outv".to_string(),
        audio_label: Some("outa".to_string()),
        streams: compiled.len(),
        duration_secs,
    })
}
