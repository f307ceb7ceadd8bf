//! TOML-based configuration for the `lasercut` tool.
//!
//! Reads `AppConfig` from the path given with `--config`, or from the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\LaserCut\config.toml`
//! - Linux:    `~/.config/lasercut/config.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/LaserCut/config.toml`
//!
//! Example:
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [compiler]
//! units_per_mm = 1000.0
//!
//! [decode]
//! strict = true
//!
//! [transport]
//! device = "/dev/ttyUSB1"
//! ```
//!
//! Every section and every key is optional.  Missing keys fall back to the
//! values the controller expects, so the tool works without any config file.

use std::path::{Path, PathBuf};

use laser_core::CompilerSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Scaling constants handed to the program compiler.
    #[serde(default)]
    pub compiler: CompilerSettings,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Malformed-message policy for `lasercut decode`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecodeConfig {
    /// Abort on the first malformed message instead of keeping its bytes.
    #[serde(default)]
    pub strict: bool,
}

/// Device node and control-line timing for `lasercut send`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Line speed of the controller's USB serial bridge.  Recorded for the
    /// device setup; the file channel does not configure it.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Pause after dropping both control lines.
    #[serde(default = "default_reset_settle_ms")]
    pub reset_settle_ms: u64,
    /// Length of the RTS-only pulse that wakes the controller.
    #[serde(default = "default_init_pulse_ms")]
    pub init_pulse_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_device() -> PathBuf {
    PathBuf::from("/dev/ttyUSB0")
}
fn default_baud_rate() -> u32 {
    38_400
}
fn default_reset_settle_ms() -> u64 {
    100
}
fn default_init_pulse_ms() -> u64 {
    5
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            reset_settle_ms: default_reset_settle_ms(),
            init_pulse_ms: default_init_pulse_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path`, or from [`config_file_path`] when `path` is
/// `None`.
///
/// A missing file yields `AppConfig::default()`.  So does an undeterminable
/// platform directory when no explicit path was given.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Ok(p) => p,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(AppConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Resolves the platform config base directory including the `LaserCut`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LaserCut"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lasercut"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("LaserCut"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
