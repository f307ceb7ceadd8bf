//! Machine-state interpretation of decoded messages.
//!
//! A [`MachineModel`] receives the side effects of the messages that have
//! any: head motion, layer selection and per-layer properties.  Everything
//! else is a no-op.  [`Simulator`] is the stock model used by listings and
//! tests; it keeps its own state and never feeds back into the codec or the
//! compiler.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::protocol::codec::Program;
use crate::protocol::field::Rgb;
use crate::protocol::messages::LaserMessage;

/// How the head gets to a target position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    /// The target is an offset from the current position.
    pub relative: bool,
    /// The laser fires along the way.
    pub cutting: bool,
}

impl Motion {
    pub const TRAVEL_ABS: Motion = Motion { relative: false, cutting: false };
    pub const TRAVEL_REL: Motion = Motion { relative: true, cutting: false };
    pub const CUT_ABS: Motion = Motion { relative: false, cutting: true };
    pub const CUT_REL: Motion = Motion { relative: true, cutting: true };
}

/// A layer property set by a header message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerProperty {
    Color(Rgb),
    Speed(i64),
    MinPower(i64),
    MaxPower(i64),
    TopLeft { x: i64, y: i64 },
    BottomRight { x: i64, y: i64 },
}

/// Consumer of message side effects.
pub trait MachineModel {
    /// Moves the head to `(x, y)`, or by `(x, y)` for relative motion.
    fn move_to(&mut self, x: i64, y: i64, motion: Motion);

    fn set_layer_property(&mut self, layer: i64, property: LayerProperty);

    fn select_layer(&mut self, layer: i64);
}

impl LaserMessage {
    /// Applies this message's side effects to `model`.
    ///
    /// Only laser 1 properties are tracked; laser 2 mirrors them in every
    /// program seen so far.
    pub fn apply_to<M: MachineModel + ?Sized>(&self, model: &mut M) {
        match *self {
            Self::MoveAbs { x, y } => model.move_to(x, y, Motion::TRAVEL_ABS),
            Self::MoveRel { dx, dy } => model.move_to(dx, dy, Motion::TRAVEL_REL),
            Self::MoveHorz { distance } => model.move_to(distance, 0, Motion::TRAVEL_REL),
            Self::MoveVert { distance } => model.move_to(0, distance, Motion::TRAVEL_REL),
            Self::CutAbs { x, y } => model.move_to(x, y, Motion::CUT_ABS),
            Self::CutRel { dx, dy } => model.move_to(dx, dy, Motion::CUT_REL),
            Self::CutHorz { distance } => model.move_to(distance, 0, Motion::CUT_REL),
            Self::CutVert { distance } => model.move_to(0, distance, Motion::CUT_REL),

            Self::LayerColor { layer, color } => {
                model.set_layer_property(layer, LayerProperty::Color(Rgb::from_packed(color)))
            }
            Self::LayerSpeed { layer, speed } => {
                model.set_layer_property(layer, LayerProperty::Speed(speed))
            }
            Self::LayerLaser1MinPower { layer, power } => {
                model.set_layer_property(layer, LayerProperty::MinPower(power))
            }
            Self::LayerLaser1MaxPower { layer, power } => {
                model.set_layer_property(layer, LayerProperty::MaxPower(power))
            }
            Self::LayerLaser1TopLeft { layer, x, y } => {
                model.set_layer_property(layer, LayerProperty::TopLeft { x, y })
            }
            Self::LayerLaser1BottomRight { layer, x, y } => {
                model.set_layer_property(layer, LayerProperty::BottomRight { x, y })
            }

            Self::ChangeLayer { layer } => model.select_layer(layer),

            _ => {}
        }
    }
}

// ── Simulator ─────────────────────────────────────────────────────────────────

/// Properties collected for one layer.  Unset properties stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerStyle {
    pub color: Option<Rgb>,
    pub speed: Option<i64>,
    pub min_power: Option<i64>,
    pub max_power: Option<i64>,
    pub top_left: Option<(i64, i64)>,
    pub bottom_right: Option<(i64, i64)>,
}

/// One cut stroke in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutSegment {
    pub layer: i64,
    pub from: (i64, i64),
    pub to: (i64, i64),
}

impl CutSegment {
    pub fn length(&self) -> f64 {
        distance(self.from, self.to)
    }
}

/// Head and layer state of a machine replaying a program.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    position: (i64, i64),
    layer: i64,
    styles: BTreeMap<i64, LayerStyle>,
    cuts: Vec<CutSegment>,
    travel_length: f64,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every message of `program` in order.  Unknown chunks are
    /// skipped.
    pub fn run(&mut self, program: &Program) {
        for msg in program.messages() {
            msg.apply_to(self);
        }
    }

    pub fn position(&self) -> (i64, i64) {
        self.position
    }

    pub fn current_layer(&self) -> i64 {
        self.layer
    }

    pub fn style(&self, layer: i64) -> Option<&LayerStyle> {
        self.styles.get(&layer)
    }

    /// Styles of every layer that had a property set, in layer order.
    pub fn styles(&self) -> impl Iterator<Item = (i64, &LayerStyle)> {
        self.styles.iter().map(|(&layer, style)| (layer, style))
    }

    pub fn cuts(&self) -> &[CutSegment] {
        &self.cuts
    }

    /// Total length cut, in device units.
    pub fn cut_length(&self) -> f64 {
        self.cuts.iter().map(CutSegment::length).sum()
    }

    /// Total length travelled with the laser off, in device units.
    pub fn travel_length(&self) -> f64 {
        self.travel_length
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            layers: self.styles.len(),
            cuts: self.cuts.len(),
            cut_length: self.cut_length(),
            travel_length: self.travel_length,
            final_position: self.position,
        }
    }
}

impl MachineModel for Simulator {
    fn move_to(&mut self, x: i64, y: i64, motion: Motion) {
        let from = self.position;
        let to = if motion.relative {
            (from.0 + x, from.1 + y)
        } else {
            (x, y)
        };
        if motion.cutting {
            self.cuts.push(CutSegment { layer: self.layer, from, to });
        } else {
            self.travel_length += distance(from, to);
        }
        self.position = to;
    }

    fn set_layer_property(&mut self, layer: i64, property: LayerProperty) {
        let style = self.styles.entry(layer).or_default();
        match property {
            LayerProperty::Color(c) => style.color = Some(c),
            LayerProperty::Speed(s) => style.speed = Some(s),
            LayerProperty::MinPower(p) => style.min_power = Some(p),
            LayerProperty::MaxPower(p) => style.max_power = Some(p),
            LayerProperty::TopLeft { x, y } => style.top_left = Some((x, y)),
            LayerProperty::BottomRight { x, y } => style.bottom_right = Some((x, y)),
        }
    }

    fn select_layer(&mut self, layer: i64) {
        debug!(layer, "layer selected");
        self.layer = layer;
    }
}

/// Totals reported after a replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSummary {
    pub layers: usize,
    pub cuts: usize,
    pub cut_length: f64,
    pub travel_length: f64,
    pub final_position: (i64, i64),
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} layer(s), {} cut(s), cut length {:.0}, travel length {:.0}, head at ({}, {})",
            self.layers,
            self.cuts,
            self.cut_length,
            self.travel_length,
            self.final_position.0,
            self.final_position.1
        )
    }
}

fn distance(a: (i64, i64), b: (i64, i64)) -> f64 {
    ((b.0 - a.0) as f64).hypot((b.1 - a.1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{ProgramItem, UnknownChunk};

    /// Records calls instead of interpreting them.
    #[derive(Default)]
    struct Recorder {
        moves: Vec<(i64, i64, Motion)>,
        properties: Vec<(i64, LayerProperty)>,
        layers: Vec<i64>,
    }

    impl MachineModel for Recorder {
        fn move_to(&mut self, x: i64, y: i64, motion: Motion) {
            self.moves.push((x, y, motion));
        }
        fn set_layer_property(&mut self, layer: i64, property: LayerProperty) {
            self.properties.push((layer, property));
        }
        fn select_layer(&mut self, layer: i64) {
            self.layers.push(layer);
        }
    }

    #[test]
    fn test_axis_moves_are_relative() {
        let mut rec = Recorder::default();
        LaserMessage::MoveHorz { distance: -5 }.apply_to(&mut rec);
        LaserMessage::CutVert { distance: 7 }.apply_to(&mut rec);
        assert_eq!(rec.moves, vec![(-5, 0, Motion::TRAVEL_REL), (0, 7, Motion::CUT_REL)]);
    }

    #[test]
    fn test_messages_without_side_effects_are_ignored() {
        let mut rec = Recorder::default();
        for msg in [
            LaserMessage::UploadFollows {},
            LaserMessage::LayerLaser2MaxPower { layer: 0, power: 10 },
            LaserMessage::E708 { unknown_a: 1, unknown_b: 1, x: 2, y: 3 },
            LaserMessage::Eof {},
        ] {
            msg.apply_to(&mut rec);
        }
        assert!(rec.moves.is_empty());
        assert!(rec.properties.is_empty());
        assert!(rec.layers.is_empty());
    }

    #[test]
    fn test_layer_color_is_unpacked() {
        let mut rec = Recorder::default();
        LaserMessage::LayerColor { layer: 2, color: 0x00FF_0000 }.apply_to(&mut rec);
        assert_eq!(
            rec.properties,
            vec![(2, LayerProperty::Color(Rgb { red: 0, green: 0, blue: 255 }))]
        );
    }

    #[test]
    fn test_simulator_tracks_cuts_and_travel() {
        // Arrange
        let program = Program::new(vec![
            LaserMessage::LayerSpeed { layer: 1, speed: 20_000 }.into(),
            LaserMessage::ChangeLayer { layer: 1 }.into(),
            LaserMessage::MoveAbs { x: 3_000, y: 4_000 }.into(),
            ProgramItem::Unknown(UnknownChunk(vec![0x80])),
            LaserMessage::CutRel { dx: 10, dy: 0 }.into(),
            LaserMessage::CutAbs { x: 3_010, y: 4_010 }.into(),
        ]);
        let mut sim = Simulator::new();

        // Act
        sim.run(&program);

        // Assert
        assert_eq!(sim.current_layer(), 1);
        assert_eq!(sim.position(), (3_010, 4_010));
        assert_eq!(sim.travel_length(), 5_000.0);
        assert_eq!(
            sim.cuts(),
            [
                CutSegment { layer: 1, from: (3_000, 4_000), to: (3_010, 4_000) },
                CutSegment { layer: 1, from: (3_010, 4_000), to: (3_010, 4_010) },
            ]
        );
        assert_eq!(sim.cut_length(), 20.0);
        assert_eq!(sim.style(1).unwrap().speed, Some(20_000));
        assert!(sim.style(0).is_none());
    }

    #[test]
    fn test_simulator_collects_layer_style() {
        let mut sim = Simulator::new();
        for msg in [
            LaserMessage::LayerLaser1MinPower { layer: 0, power: 100 },
            LaserMessage::LayerLaser1MaxPower { layer: 0, power: 200 },
            LaserMessage::LayerColor { layer: 0, color: 0xFF },
            LaserMessage::LayerLaser1TopLeft { layer: 0, x: 0, y: 0 },
            LaserMessage::LayerLaser1BottomRight { layer: 0, x: 10, y: 20 },
        ] {
            msg.apply_to(&mut sim);
        }
        assert_eq!(
            sim.style(0),
            Some(&LayerStyle {
                color: Some(Rgb { red: 255, green: 0, blue: 0 }),
                speed: None,
                min_power: Some(100),
                max_power: Some(200),
                top_left: Some((0, 0)),
                bottom_right: Some((10, 20)),
            })
        );
        assert_eq!(sim.styles().count(), 1);
    }

    #[test]
    fn test_summary_display() {
        let mut sim = Simulator::new();
        sim.move_to(0, 100, Motion::CUT_ABS);
        assert_eq!(
            sim.summary().to_string(),
            "0 layer(s), 1 cut(s), cut length 100, travel length 0, head at (0, 100)"
        );
    }
}
