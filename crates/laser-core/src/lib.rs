//! # laser-core
//!
//! Shared library for the laser cutter toolchain containing the serial wire
//! codec, the message catalog, cut-job geometry and the program compiler.
//!
//! It has no dependencies on serial drivers, file formats or the command line;
//! those live in `laser-cli`.
//!
//! # Architecture overview
//!
//! The controller accepts a single scrambled byte stream per job.  Reading
//! such a stream and producing one are the two directions this crate covers:
//!
//! - **`protocol`** – How bytes travel to the device.  Every byte is scrambled
//!   with a fixed bijection; the plain stream is a sequence of messages, each
//!   starting with the only byte that has its top bit set.  Messages are
//!   decoded into typed [`LaserMessage`] values via a static opcode table, and
//!   bytes the table does not know are kept verbatim so that
//!   `encode(decode(bytes)) == bytes`.
//!
//! - **`domain`** – Cut geometry: points, segments, connected pieces and the
//!   layers that group them with power, speed and colour.
//!
//! - **`program`** – The compiler that turns layers into a full [`Program`]
//!   (header, per-layer properties, move/cut body, footer), and a simulator
//!   that replays a program to recover head motion and layer settings.
//!
//! ```rust
//! use laser_core::{Compiler, Layer, Line, Point, Program};
//!
//! let p = Point::new;
//! let layer = Layer::from_lines(
//!     [1.0, 0.0, 0.0],
//!     50.0,
//!     20.0,
//!     vec![Line::new(p(0.0, 0.0), p(10.0, 0.0)), Line::new(p(10.0, 0.0), p(10.0, 10.0))],
//! );
//! let wire = Compiler::default().compile_to_wire(&[layer]).unwrap();
//! let program = Program::from_wire(&wire).unwrap();
//! assert_eq!(program.unknown_count(), 0);
//! ```

pub mod domain;
pub mod program;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `laser_core::Program` instead of `laser_core::protocol::codec::Program`.
pub use domain::geometry::{chain_pieces, BoundingBox, Line, Piece, Point};
pub use domain::layer::Layer;
pub use program::compiler::{CompileError, Compiler, CompilerSettings};
pub use program::simulator::{MachineModel, Simulator};
pub use protocol::codec::{Program, ProgramItem, ProtocolError, UnknownChunk};
pub use protocol::messages::LaserMessage;
