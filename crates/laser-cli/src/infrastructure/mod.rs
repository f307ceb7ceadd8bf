//! Infrastructure layer for the `lasercut` tool.
//!
//! Contains OS-facing adapters: configuration storage, geometry input files,
//! and the byte channel to the controller.
//!
//! **Dependency rule**: this layer may depend on `laser_core`, but MUST NOT
//! be imported by `laser_core`.

pub mod geometry_input;
pub mod storage;
pub mod transport;
