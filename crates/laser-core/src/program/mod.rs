//! Program construction and interpretation.
//!
//! - [`compiler`] turns cut layers into a complete, validated [`Program`].
//! - [`simulator`] replays a program against a machine model.
//!
//! [`Program`]: crate::protocol::codec::Program

pub mod compiler;
pub mod simulator;
