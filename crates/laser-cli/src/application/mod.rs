//! Application layer use cases for the `lasercut` tool.
//!
//! Use cases work on bytes and domain values.  They contain no file system
//! access; `main.rs` reads and writes files and the `infrastructure` layer
//! provides the device channel.
//!
//! # Sub-modules
//!
//! - **`decode_file`**  – Decodes a scrambled program, re-encodes it and
//!   checks that nothing was lost.  Optionally renders a listing.
//!
//! - **`compile_job`**  – Compiles layers into a scrambled program.
//!
//! - **`send_program`** – Checks a scrambled program and writes it to the
//!   controller after the reset sequence.

pub mod compile_job;
pub mod decode_file;
pub mod send_program;
