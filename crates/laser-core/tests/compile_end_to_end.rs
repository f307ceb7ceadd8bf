//! End-to-end tests: layers in, scrambled bytes out, and back again.

use laser_core::program::compiler::{scale_power, CompileError};
use laser_core::program::simulator::{CutSegment, Simulator};
use laser_core::{Compiler, LaserMessage, Layer, Line, Point, Program, ProtocolError};

fn line(ax: f64, ay: f64, bx: f64, by: f64) -> Line {
    Line::new(Point::new(ax, ay), Point::new(bx, by))
}

/// One layer, one piece: (0,0) → (10,0) → (10,10), red, 50 %, 20 mm/s.
fn corner_layer() -> Layer {
    Layer::from_lines(
        [1.0, 0.0, 0.0],
        50.0,
        20.0,
        vec![line(0.0, 0.0, 10.0, 0.0), line(10.0, 0.0, 10.0, 10.0)],
    )
}

#[test]
fn test_corner_job_body_and_wire_round_trip() {
    // Arrange
    let compiler = Compiler::default();

    // Act
    let program = compiler.compile(&[corner_layer()]).unwrap();
    let wire = compiler.compile_to_wire(&[corner_layer()]).unwrap();

    // Assert: the body is exactly one move and two cuts
    let body: Vec<&LaserMessage> = program
        .messages()
        .filter(|m| matches!(m, LaserMessage::MoveAbs { .. } | LaserMessage::CutAbs { .. }))
        .collect();
    assert_eq!(
        body,
        vec![
            &LaserMessage::MoveAbs { x: 0, y: 0 },
            &LaserMessage::CutAbs { x: 10_000, y: 0 },
            &LaserMessage::CutAbs { x: 10_000, y: 10_000 },
        ]
    );

    // Assert: unscrambling and decoding reproduces the program exactly
    assert_eq!(Program::from_wire(&wire).unwrap(), program);
}

#[test]
fn test_corner_job_replays_on_simulator() {
    let program = Compiler::default().compile(&[corner_layer()]).unwrap();

    let mut sim = Simulator::new();
    sim.run(&program);

    assert_eq!(
        sim.cuts(),
        [
            CutSegment { layer: 0, from: (0, 0), to: (10_000, 0) },
            CutSegment { layer: 0, from: (10_000, 0), to: (10_000, 10_000) },
        ]
    );
    let style = sim.style(0).unwrap();
    assert_eq!(style.speed, Some(20_000));
    assert_eq!(style.min_power, Some(scale_power(50.0)));
    assert_eq!(style.bottom_right, Some((10_000, 10_000)));
    assert_eq!(sim.cut_length(), 20_000.0);
}

#[test]
fn test_multi_layer_job_keeps_layer_order() {
    let blue = Layer::from_lines(
        [0.0, 0.0, 1.0],
        30.0,
        100.0,
        vec![line(20.0, 20.0, 25.0, 20.0), line(30.0, 30.0, 31.0, 31.0)],
    );

    let program = Compiler::default().compile(&[corner_layer(), blue]).unwrap();
    let mut sim = Simulator::new();
    sim.run(&program);

    let layers: Vec<i64> = sim.cuts().iter().map(|c| c.layer).collect();
    assert_eq!(layers, vec![0, 0, 1, 1]);
    assert_eq!(sim.style(1).unwrap().speed, Some(100_000));
    assert_eq!(
        sim.style(1).unwrap().color.map(|c| c.packed()),
        Some(0x00FF_0000)
    );
}

#[test]
fn test_job_too_large_for_coordinate_field() {
    // Abs fields hold 35 bits; 40 km of travel does not fit.
    let huge = Layer::from_lines([0.0; 3], 10.0, 10.0, vec![line(0.0, 0.0, 4.0e7, 0.0)]);

    let err = Compiler::default().compile(&[huge]).unwrap_err();

    assert!(matches!(
        err,
        CompileError::Protocol(ProtocolError::FieldOverflow { field: "x", .. })
    ));
}
