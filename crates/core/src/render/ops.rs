//! Filter operations that can be appended to a pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::RenderError;

/// Frame size every stream is normalised to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same frame turned by a quarter.
    pub fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub(crate) fn validate(self) -> Result<Self, RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::invalid_argument(format!(
                "geometry must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(self)
    }
}

/// Rectangle in output pixels, used to place overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(top: u32, left: u32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub(crate) fn validate(self) -> Result<Self, RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::invalid_argument(format!(
                "overlay region must have a non-zero area, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(self)
    }
}

/// Colour correction applied by `eq`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBalance {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for ColorBalance {
    fn default() -> Self {
        Self {
            brightness: 0.03,
            contrast: 1.05,
            saturation: 1.15,
        }
    }
}

/// One operation in a pipeline node's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterOp {
    ColorAdjust(ColorBalance),
    /// Clockwise quarter turns; consecutive rotations add up modulo 4.
    Rotate { quarter_turns: i32 },
    Overlay { image: PathBuf, region: Region },
    Trim { start_secs: f64, duration_secs: f64 },
    /// Replace the stream's audio with generated silence.
    SilentAudio,
    /// Fit the picture to a geometry, later padded into the master frame.
    TargetGeometry(Geometry),
}

impl FilterOp {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::ColorAdjust(_) => "color_adjust",
            FilterOp::Rotate { .. } => "rotate",
            FilterOp::Overlay { .. } => "overlay",
            FilterOp::Trim { .. } => "trim",
            FilterOp::SilentAudio => "silent_audio",
            FilterOp::TargetGeometry(_) => "target_geometry",
        }
    }

    /// Builds a trim op, rejecting negative or empty windows.
    pub(crate) fn trim(start_secs: f64, duration_secs: f64) -> Result<Self, RenderError> {
        if !start_secs.is_finite() || start_secs < 0.0 {
            return Err(RenderError::invalid_argument(format!(
                "trim start must be >= 0, got {start_secs}"
            )));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(RenderError::invalid_argument(format!(
                "trim duration must be > 0, got {duration_secs}"
            )));
        }
        Ok(FilterOp::Trim {
            start_secs,
            duration_secs,
        })
    }
}

/// Normalises a signed quarter-turn count into 0..4.
pub fn normalize_turns(turns: i32) -> u8 {
    turns.rem_euclid(4) as u8
}
