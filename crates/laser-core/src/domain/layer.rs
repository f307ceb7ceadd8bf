//! Cut layers: per-layer laser parameters plus the pieces cut with them.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::{chain_pieces, BoundingBox, Line, Piece};
use crate::protocol::field::Rgb;

/// One layer of a cut job.
///
/// The layer index on the wire is the layer's position in the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Display colour as `[red, green, blue]` fractions in `0.0..=1.0`.
    pub color: [f64; 3],
    /// Laser power in percent, `0.0..=100.0`.
    pub power: f64,
    /// Head speed in mm/s.
    pub speed: f64,
    /// Connected paths, cut in order.
    pub pieces: Vec<Piece>,
}

impl Layer {
    /// Builds a layer from loose segments, chaining them into pieces.
    pub fn from_lines(color: [f64; 3], power: f64, speed: f64, lines: Vec<Line>) -> Self {
        Self {
            color,
            power,
            speed,
            pieces: chain_pieces(lines),
        }
    }

    /// The layer colour as it is sent to the device.
    pub fn rgb(&self) -> Rgb {
        Rgb::from_fractions(self.color)
    }

    /// Bounding box of this layer's geometry.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of_pieces(&self.pieces)
    }
}

/// Bounding box over every piece of every layer.
pub fn job_bounding_box(layers: &[Layer]) -> Option<BoundingBox> {
    BoundingBox::of_pieces(layers.iter().flat_map(|l| l.pieces.iter()))
}
