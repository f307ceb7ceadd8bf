//! JSON geometry input.
//!
//! The input lists layers in job order, each with loose line segments in
//! millimetres:
//!
//! ```json
//! { "layers": [ { "color": [1.0, 0.0, 0.0], "power": 50.0, "speed": 20.0,
//!                 "lines": [ { "a": {"x": 0, "y": 0}, "b": {"x": 10, "y": 0} } ] } ] }
//! ```
//!
//! Segments are chained into pieces in the order given.

use std::path::{Path, PathBuf};

use laser_core::{Layer, Line};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Error type for reading geometry input.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("failed to read geometry from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid geometry JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A layer parameter is outside its allowed range.
    #[error("layer {layer}: {reason}")]
    InvalidLayer { layer: usize, reason: String },
}

/// The whole input document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    pub layers: Vec<LayerInput>,
}

/// One layer as written in the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInput {
    /// `[red, green, blue]`, each `0.0..=1.0`.
    pub color: [f64; 3],
    /// Percent, `0.0..=100.0`.
    pub power: f64,
    /// mm/s.
    pub speed: f64,
    #[serde(default)]
    pub lines: Vec<Line>,
}

impl JobInput {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Parse`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, GeometryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks layer parameters and chains each layer's lines into pieces.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidLayer`] for a colour component outside
    /// `0..=1`, a power outside `0..=100`, or a negative or non-finite speed.
    pub fn into_layers(self) -> Result<Vec<Layer>, GeometryError> {
        self.layers
            .into_iter()
            .enumerate()
            .map(|(i, input)| {
                input.validate(i)?;
                let layer = Layer::from_lines(input.color, input.power, input.speed, input.lines);
                debug!(layer = i, pieces = layer.pieces.len(), "chained layer");
                Ok(layer)
            })
            .collect()
    }
}

impl LayerInput {
    fn validate(&self, layer: usize) -> Result<(), GeometryError> {
        let invalid = |reason: String| -> Result<(), GeometryError> {
            Err(GeometryError::InvalidLayer { layer, reason })
        };
        if !self.color.iter().all(|c| (0.0..=1.0).contains(c)) {
            return invalid(format!("colour {:?} is outside 0..=1", self.color));
        }
        if !(0.0..=100.0).contains(&self.power) {
            return invalid(format!("power {} is outside 0..=100", self.power));
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return invalid(format!("speed {} is not a non-negative number", self.speed));
        }
        Ok(())
    }
}

/// Reads and validates a geometry file.
///
/// # Errors
///
/// See [`GeometryError`].
pub fn read_layers(path: &Path) -> Result<Vec<Layer>, GeometryError> {
    let json = std::fs::read_to_string(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    JobInput::from_json(&json)?.into_layers()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
