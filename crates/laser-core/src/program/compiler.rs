//! Compiles cut layers into a complete device program.
//!
//! Program layout:
//!
//! ```text
//! header      upload marker, start markers, job bounding box (two lasers)
//!             per-layer property block (speed, power, colour, bounds)
//!             layer count, offsets, job bounding box in every origin variant
//! body        per layer: change-layer block, then per piece one MoveAbs to
//!             the first point and one CutAbs per following point
//! footer      finish markers, job size, end of file
//! ```
//!
//! Coordinates are translated so the job's minimum corner maps to `(0, 0)`
//! and scaled from millimetres to device units (µm by default).  Most of the
//! header is a fixed sequence captured from the vendor software; the messages
//! of unknown purpose are emitted exactly as captured.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::geometry::{BoundingBox, Piece, Point};
use crate::domain::layer::{job_bounding_box, Layer};
use crate::protocol::codec::{Program, ProgramItem, ProtocolError};
use crate::protocol::messages::LaserMessage;

/// Fraction of full power never exceeded, whatever the layer asks for.
pub const POWER_CAP: f64 = 0.90;
/// Percent of full power per device power unit.
pub const POWER_UNIT: f64 = 0.0061;
/// Device units per millimetre.
pub const UNITS_PER_MM: f64 = 1000.0;
/// Constant carried by the closing `DA01` message.
pub const FOOTER_CONSTANT: i64 = 800;

/// Device selected before the layer change.
const DEVICE_BEFORE_LAYER: i64 = 0x00;
/// Devices selected after the layer change, in order.
const DEVICES_AFTER_LAYER: [i64; 3] = [0x30, 0x10, 0x13];

/// Errors that abort a compile.  No output is produced when one occurs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// No layer contains any geometry, so there is no bounding box.
    #[error("job contains no geometry")]
    EmptyGeometry,

    /// A coordinate is NaN or infinite.
    #[error("layer {layer} contains a non-finite coordinate")]
    NonFiniteCoordinate { layer: usize },

    /// A layer's colour, power or speed is NaN or infinite.
    #[error("layer {layer} has a non-finite {parameter}")]
    NonFiniteParameter { layer: usize, parameter: &'static str },

    /// A layer parameter or coordinate does not fit its wire field.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Scaling constants used by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// See [`POWER_CAP`].
    pub power_cap: f64,
    /// See [`POWER_UNIT`].
    pub power_unit: f64,
    /// See [`UNITS_PER_MM`].
    pub units_per_mm: f64,
    /// See [`FOOTER_CONSTANT`].
    pub footer_constant: i64,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            power_cap: POWER_CAP,
            power_unit: POWER_UNIT,
            units_per_mm: UNITS_PER_MM,
            footer_constant: FOOTER_CONSTANT,
        }
    }
}

impl CompilerSettings {
    /// Converts a power percentage to device power units, applying the cap.
    pub fn scale_power(&self, percent: f64) -> i64 {
        (percent * self.power_cap / self.power_unit).floor() as i64
    }

    /// Converts millimetres (or mm/s) to device units, truncating toward zero.
    pub fn to_device_units(&self, mm: f64) -> i64 {
        (mm * self.units_per_mm) as i64
    }
}

/// [`CompilerSettings::scale_power`] with the default constants.
///
/// ```rust
/// use laser_core::program::compiler::scale_power;
///
/// assert_eq!(scale_power(100.0), 14754);
/// assert_eq!(scale_power(0.0), 0);
/// ```
pub fn scale_power(percent: f64) -> i64 {
    CompilerSettings::default().scale_power(percent)
}

/// Size of the job in device units.  The job origin is always `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExtent {
    pub width: i64,
    pub height: i64,
}

/// Device-unit parameters of one layer, ready to be turned into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSetup {
    pub index: i64,
    pub color: i64,
    pub min_power: i64,
    pub max_power: i64,
    pub speed: i64,
    pub extent: JobExtent,
}

impl LayerSetup {
    pub fn new(index: usize, layer: &Layer, settings: &CompilerSettings, extent: JobExtent) -> Self {
        let power = settings.scale_power(layer.power);
        Self {
            index: index as i64,
            color: layer.rgb().packed(),
            min_power: power,
            max_power: power,
            speed: settings.to_device_units(layer.speed),
            extent,
        }
    }

    /// Property block declared in the program header.
    pub fn property_messages(&self) -> Vec<LaserMessage> {
        let layer = self.index;
        let JobExtent { width, height } = self.extent;
        vec![
            LaserMessage::LayerSpeed { layer, speed: self.speed },
            LaserMessage::LayerLaser1MinPower { layer, power: self.min_power },
            LaserMessage::LayerLaser1MaxPower { layer, power: self.max_power },
            LaserMessage::LayerLaser2MinPower { layer, power: self.min_power },
            LaserMessage::LayerLaser2MaxPower { layer, power: self.max_power },
            LaserMessage::LayerColor { layer, color: self.color },
            LaserMessage::LayerCA41 { layer, u0: 0 },
            LaserMessage::LayerLaser1TopLeft { layer, x: 0, y: 0 },
            LaserMessage::LayerLaser1BottomRight { layer, x: width, y: height },
            LaserMessage::LayerLaser2TopLeft { layer, x: 0, y: 0 },
            LaserMessage::LayerLaser2BottomRight { layer, x: width, y: height },
        ]
    }

    /// Block that switches the machine to this layer before its pieces.
    pub fn change_messages(&self) -> Vec<LaserMessage> {
        let mut msgs = vec![
            LaserMessage::EnableDevice { device: DEVICE_BEFORE_LAYER },
            LaserMessage::ChangeLayer { layer: self.index },
        ];
        msgs.extend(
            DEVICES_AFTER_LAYER
                .iter()
                .map(|&device| LaserMessage::EnableDevice { device }),
        );
        msgs.extend([
            LaserMessage::CutOpenDelay { ms: 0 },
            LaserMessage::CutCloseDelay { ms: 0 },
            LaserMessage::CA03 { unknown: 0x3F },
            LaserMessage::CA10 { unknown: 0x00 },
        ]);
        msgs
    }
}

/// Fixed program header around the per-layer property blocks.
pub fn header_messages(extent: JobExtent, layers: &[LayerSetup]) -> Vec<LaserMessage> {
    let JobExtent { width, height } = extent;
    let mut msgs = vec![
        LaserMessage::UploadFollows {},
        LaserMessage::F0 {},
        LaserMessage::Start2 {},
        LaserMessage::LightRed {},
        LaserMessage::Feedrate { x: 0, y: 0 },
        LaserMessage::E738 {},
        LaserMessage::Laser1TopLeft { x: 0, y: 0 },
        LaserMessage::Laser1BottomRight { x: width, y: height },
        LaserMessage::Laser2TopLeft { x: 0, y: 0 },
        LaserMessage::Laser2BottomRight { x: width, y: height },
        LaserMessage::E704 { a: 1, b: 1, x: 0, y: 0 },
        LaserMessage::E705 {},
    ];

    msgs.extend(layers.iter().flat_map(LayerSetup::property_messages));

    msgs.extend([
        LaserMessage::LayerCount { layer_count: layers.len() as i64 - 1 },
        LaserMessage::PenYOffset { device: 0, y: 0 },
        LaserMessage::PenYOffset { device: 1, y: 0 },
        LaserMessage::LaserYOffset { device: 0, y: 0 },
        LaserMessage::LaserYOffset { device: 1, y: 0 },
        LaserMessage::Offset { x: 0, y: 0 },
        LaserMessage::Start0 {},
        LaserMessage::Start1 {},
        LaserMessage::F200 {},
        LaserMessage::Offset2 { x: 0, y: 0 },
        LaserMessage::BottomRight { x: width, y: height },
        LaserMessage::F205 { a: 1, b: 1, x: width, y: height },
        LaserMessage::F206 { x: 0, y: 0 },
        LaserMessage::F207 {},
        LaserMessage::F208 { x: width, y: height },
        LaserMessage::E70A { a: 0 },
        LaserMessage::EA00 {},
        LaserMessage::E760 {},
        LaserMessage::E300 {},
        LaserMessage::E70B {},
        LaserMessage::E713 { a: 0, b: 0 },
        LaserMessage::E717 { a: width, b: height },
        LaserMessage::E723 { a: 0, b: 0 },
        LaserMessage::E724 {},
        LaserMessage::E737 { a: width, b: height },
        LaserMessage::E708 { unknown_a: 1, unknown_b: 1, x: width, y: height },
    ]);
    msgs
}

/// Fixed program footer.
pub fn footer_messages(extent: JobExtent, constant: i64) -> Vec<LaserMessage> {
    vec![
        LaserMessage::E4 {},
        LaserMessage::Finish {},
        LaserMessage::E700 {},
        LaserMessage::DA01 { a: constant, x: extent.width, y: extent.height },
        LaserMessage::Eof {},
    ]
}

/// Turns layers into programs.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    settings: CompilerSettings,
}

impl Compiler {
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Builds the complete program for `layers`.
    ///
    /// Layer `i` of the slice becomes device layer `i`.  The returned program
    /// is validated, so encoding it cannot fail.
    ///
    /// # Errors
    ///
    /// - [`CompileError::NonFiniteParameter`] for a NaN or infinite colour,
    ///   power or speed.
    /// - [`CompileError::NonFiniteCoordinate`] for NaN or infinite geometry.
    /// - [`CompileError::EmptyGeometry`] when no layer has any segment.
    /// - [`CompileError::Protocol`] when a value does not fit its field, for
    ///   example power above 100 %, more than 128 layers, or a job too large
    ///   for the coordinate fields.
    pub fn compile(&self, layers: &[Layer]) -> Result<Program, CompileError> {
        for (layer, l) in layers.iter().enumerate() {
            if let Some(parameter) = non_finite_parameter(l) {
                return Err(CompileError::NonFiniteParameter { layer, parameter });
            }
        }
        if let Some(layer) = layers.iter().position(|l| !layer_is_finite(l)) {
            return Err(CompileError::NonFiniteCoordinate { layer });
        }
        let bbox = job_bounding_box(layers).ok_or(CompileError::EmptyGeometry)?;
        let extent = JobExtent {
            width: self.settings.to_device_units(bbox.width()),
            height: self.settings.to_device_units(bbox.height()),
        };
        debug!(?bbox, ?extent, "job bounds");

        let setups: Vec<LayerSetup> = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerSetup::new(i, layer, &self.settings, extent))
            .collect();

        let mut msgs = header_messages(extent, &setups);
        let mut piece_count = 0;
        for (setup, layer) in setups.iter().zip(layers) {
            msgs.extend(setup.change_messages());
            for piece in &layer.pieces {
                msgs.extend(self.piece_messages(piece, &bbox));
                piece_count += 1;
            }
        }
        msgs.extend(footer_messages(extent, self.settings.footer_constant));

        let program = Program::new(msgs.into_iter().map(ProgramItem::from).collect());
        program.validate()?;

        info!(
            layers = layers.len(),
            pieces = piece_count,
            messages = program.items.len(),
            "compiled program"
        );
        Ok(program)
    }

    /// Compiles, encodes and scrambles `layers` into transmittable bytes.
    ///
    /// # Errors
    ///
    /// See [`Compiler::compile`].
    pub fn compile_to_wire(&self, layers: &[Layer]) -> Result<Vec<u8>, CompileError> {
        Ok(self.compile(layers)?.to_wire()?)
    }

    /// `MoveAbs` to the first point of `piece`, then `CutAbs` to every
    /// following point.  An empty piece produces nothing.
    fn piece_messages(&self, piece: &Piece, bbox: &BoundingBox) -> Vec<LaserMessage> {
        let to_device = |p: Point| {
            (
                self.settings.to_device_units(p.x - bbox.min.x),
                self.settings.to_device_units(p.y - bbox.min.y),
            )
        };
        piece
            .points()
            .enumerate()
            .map(|(i, p)| {
                let (x, y) = to_device(p);
                if i == 0 {
                    LaserMessage::MoveAbs { x, y }
                } else {
                    LaserMessage::CutAbs { x, y }
                }
            })
            .collect()
    }
}

/// Name of the first layer parameter that would not scale to a device value.
fn non_finite_parameter(layer: &Layer) -> Option<&'static str> {
    if !layer.color.iter().all(|c| c.is_finite()) {
        Some("colour")
    } else if !layer.power.is_finite() {
        Some("power")
    } else if !layer.speed.is_finite() {
        Some("speed")
    } else {
        None
    }
}

fn layer_is_finite(layer: &Layer) -> bool {
    layer
        .pieces
        .iter()
        .flat_map(|p| p.lines())
        .all(|l| l.a.is_finite() && l.b.is_finite())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Line;
    use crate::protocol::field::{FieldError, FieldKind};

    fn line(ax: f64, ay: f64, bx: f64, by: f64) -> Line {
        Line::new(Point::new(ax, ay), Point::new(bx, by))
    }

    fn square_layer() -> Layer {
        Layer::from_lines(
            [1.0, 0.0, 0.0],
            50.0,
            20.0,
            vec![line(0.0, 0.0, 10.0, 0.0), line(10.0, 0.0, 10.0, 10.0)],
        )
    }

    fn messages(program: &Program) -> Vec<LaserMessage> {
        program.messages().cloned().collect()
    }

    #[test]
    fn test_scale_power_reference_values() {
        assert_eq!(scale_power(100.0), 14754);
        assert_eq!(scale_power(50.0), 7377);
        assert_eq!(scale_power(0.0), 0);
    }

    #[test]
    fn test_to_device_units_truncates() {
        let s = CompilerSettings::default();
        assert_eq!(s.to_device_units(10.0), 10_000);
        assert_eq!(s.to_device_units(0.0004), 0);
    }

    #[test]
    fn test_body_is_move_then_cuts() {
        // Arrange
        let compiler = Compiler::default();

        // Act
        let program = compiler.compile(&[square_layer()]).unwrap();
        let msgs = messages(&program);

        // Assert: body sits between the CA10 closing the change block and E4
        let start = msgs
            .iter()
            .position(|m| matches!(m, LaserMessage::CA10 { .. }))
            .unwrap()
            + 1;
        let end = msgs.iter().position(|m| *m == LaserMessage::E4 {}).unwrap();
        assert_eq!(
            msgs[start..end],
            [
                LaserMessage::MoveAbs { x: 0, y: 0 },
                LaserMessage::CutAbs { x: 10_000, y: 0 },
                LaserMessage::CutAbs { x: 10_000, y: 10_000 },
            ]
        );
    }

    #[test]
    fn test_coordinates_are_translated_to_origin() {
        let layer = Layer::from_lines([0.0; 3], 10.0, 10.0, vec![line(5.0, -2.0, 7.0, 3.0)]);
        let msgs = messages(&Compiler::default().compile(&[layer]).unwrap());
        assert!(msgs.contains(&LaserMessage::MoveAbs { x: 0, y: 0 }));
        assert!(msgs.contains(&LaserMessage::CutAbs { x: 2_000, y: 5_000 }));
        assert!(msgs.contains(&LaserMessage::Laser1BottomRight { x: 2_000, y: 5_000 }));
    }

    #[test]
    fn test_layer_properties() {
        let msgs = messages(&Compiler::default().compile(&[square_layer()]).unwrap());
        for expected in [
            LaserMessage::LayerSpeed { layer: 0, speed: 20_000 },
            LaserMessage::LayerLaser1MinPower { layer: 0, power: 7377 },
            LaserMessage::LayerLaser1MaxPower { layer: 0, power: 7377 },
            LaserMessage::LayerLaser2MinPower { layer: 0, power: 7377 },
            LaserMessage::LayerLaser2MaxPower { layer: 0, power: 7377 },
            LaserMessage::LayerColor { layer: 0, color: 0xFF },
            LaserMessage::LayerLaser1BottomRight { layer: 0, x: 10_000, y: 10_000 },
            LaserMessage::LayerCount { layer_count: 0 },
        ] {
            assert!(msgs.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_program_frame() {
        let msgs = messages(&Compiler::default().compile(&[square_layer()]).unwrap());
        assert_eq!(msgs[0], LaserMessage::UploadFollows {});
        assert_eq!(
            msgs[msgs.len() - 2..],
            [
                LaserMessage::DA01 { a: 800, x: 10_000, y: 10_000 },
                LaserMessage::Eof {},
            ]
        );
    }

    #[test]
    fn test_each_layer_gets_change_block_in_order() {
        let second = Layer::from_lines([0.0, 0.0, 1.0], 20.0, 100.0, vec![line(1.0, 1.0, 2.0, 2.0)]);
        let msgs = messages(&Compiler::default().compile(&[square_layer(), second]).unwrap());

        let changes: Vec<i64> = msgs
            .iter()
            .filter_map(|m| match m {
                LaserMessage::ChangeLayer { layer } => Some(*layer),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![0, 1]);
        assert!(msgs.contains(&LaserMessage::LayerCount { layer_count: 1 }));
    }

    #[test]
    fn test_layer_without_geometry_still_gets_header_and_change_block() {
        let empty = Layer::from_lines([0.0; 3], 10.0, 10.0, Vec::new());
        let msgs = messages(&Compiler::default().compile(&[empty, square_layer()]).unwrap());
        assert!(msgs.contains(&LaserMessage::ChangeLayer { layer: 0 }));
        assert_eq!(msgs.iter().filter(|m| matches!(m, LaserMessage::MoveAbs { .. })).count(), 1);
    }

    #[test]
    fn test_empty_job_is_rejected() {
        assert_eq!(Compiler::default().compile(&[]), Err(CompileError::EmptyGeometry));
        let empty = Layer::from_lines([0.0; 3], 10.0, 10.0, Vec::new());
        assert_eq!(Compiler::default().compile(&[empty]), Err(CompileError::EmptyGeometry));
    }

    #[test]
    fn test_non_finite_coordinate_is_rejected() {
        let bad = Layer::from_lines([0.0; 3], 10.0, 10.0, vec![line(0.0, 0.0, f64::NAN, 1.0)]);
        assert_eq!(
            Compiler::default().compile(&[square_layer(), bad]),
            Err(CompileError::NonFiniteCoordinate { layer: 1 })
        );
    }

    #[test]
    fn test_non_finite_power_or_speed_is_rejected() {
        // Arrange
        let mut nan_power = square_layer();
        nan_power.power = f64::NAN;
        let mut inf_speed = square_layer();
        inf_speed.speed = f64::INFINITY;
        let mut nan_colour = square_layer();
        nan_colour.color = [f64::NAN, 0.0, 0.0];

        // Act / Assert
        let compiler = Compiler::default();
        assert_eq!(
            compiler.compile(&[nan_power]),
            Err(CompileError::NonFiniteParameter { layer: 0, parameter: "power" })
        );
        assert_eq!(
            compiler.compile(&[square_layer(), inf_speed]),
            Err(CompileError::NonFiniteParameter { layer: 1, parameter: "speed" })
        );
        assert_eq!(
            compiler.compile(&[nan_colour]),
            Err(CompileError::NonFiniteParameter { layer: 0, parameter: "colour" })
        );
    }

    #[test]
    fn test_nan_power_and_speed_never_compile_to_zero() {
        let layer = Layer::from_lines(
            [1.0, 0.0, 0.0],
            f64::NAN,
            f64::NAN,
            vec![line(0.0, 0.0, 5.0, 0.0)],
        );
        assert!(Compiler::default().compile(&[layer]).is_err());
    }

    #[test]
    fn test_excess_power_fails_loudly() {
        let mut layer = square_layer();
        layer.power = 112.0;
        let err = Compiler::default().compile(&[layer]).unwrap_err();
        assert_eq!(
            err,
            CompileError::Protocol(ProtocolError::FieldOverflow {
                message: "LayerLaser1MinPower",
                field: "power",
                source: FieldError::Overflow {
                    kind: FieldKind::Power,
                    value: 16_524,
                    min: 0,
                    max: 16_383,
                },
            })
        );
    }

    #[test]
    fn test_compile_to_wire_round_trips() {
        let compiler = Compiler::default();
        let program = compiler.compile(&[square_layer()]).unwrap();
        let wire = compiler.compile_to_wire(&[square_layer()]).unwrap();
        assert_eq!(Program::from_wire(&wire).unwrap(), program);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let s: CompilerSettings = serde_json::from_str(r#"{ "units_per_mm": 100.0 }"#).unwrap();
        assert_eq!(s.units_per_mm, 100.0);
        assert_eq!(s.power_cap, POWER_CAP);
        assert_eq!(s.footer_constant, FOOTER_CONSTANT);
    }
}
