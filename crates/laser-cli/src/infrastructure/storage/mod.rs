//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from an explicit
//! path or the platform-appropriate directory, and provides defaults when the
//! file does not exist.

pub mod config;
