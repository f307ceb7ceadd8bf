//! Wire protocol: scrambling, field codec, framing, the message catalog and
//! the program codec built on top of them.

pub mod codec;
pub mod field;
pub mod frame;
pub mod messages;
pub mod registry;
pub mod scramble;

pub use codec::{decode_program, decode_program_lenient, Program, ProgramItem, ProtocolError, UnknownChunk};
pub use field::{FieldError, FieldKind, Rgb};
pub use messages::{LaserMessage, MessageDescriptor, MessageKind, CATALOG};
pub use scramble::{scramble, unscramble};
