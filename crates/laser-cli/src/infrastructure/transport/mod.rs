//! Transport infrastructure: delivering program bytes to the controller.
//!
//! The controller sits behind a USB serial bridge.  Before the first byte of
//! a job it needs a reset pulse on the two modem control lines:
//!
//! ```text
//! DTR ─┐                           ┌───────
//!      └───────────────────────────┘
//! RTS ─┐              ┌────────────┐
//!      └──────────────┘            └───────
//!        reset_settle   init_pulse
//! ```
//!
//! # Testability
//!
//! The `DeviceChannel` trait is the seam between the send use case and the
//! operating system.  Unit tests use a mock channel; [`file::FileChannel`]
//! writes to a device node or a plain file.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub mod file;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device or file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the channel or driving its control lines failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// A write-only byte channel with two modem control lines.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceChannel {
    /// Sets the DTR and RTS lines (`true` = asserted).
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), TransportError>;

    /// Writes every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Control-line pulse that resets the controller before a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSequence {
    /// Pause with both lines released.
    pub settle: Duration,
    /// Length of the RTS-only pulse.
    pub pulse: Duration,
}

impl ResetSequence {
    pub fn new(settle: Duration, pulse: Duration) -> Self {
        Self { settle, pulse }
    }

    /// Drives the control lines of `channel` through the reset pulse.
    ///
    /// # Errors
    ///
    /// Propagates the first channel error; the lines are left as they were at
    /// that point.
    pub fn run<C: DeviceChannel + ?Sized>(&self, channel: &mut C) -> Result<(), TransportError> {
        debug!(settle = ?self.settle, pulse = ?self.pulse, "resetting controller");
        channel.set_control_lines(false, false)?;
        std::thread::sleep(self.settle);
        channel.set_control_lines(false, true)?;
        std::thread::sleep(self.pulse);
        channel.set_control_lines(true, false)
    }
}

impl Default for ResetSequence {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(5))
    }
}

/// A channel that runs its reset sequence once, before the first write.
#[derive(Debug)]
pub struct Transport<C> {
    channel: C,
    reset: ResetSequence,
    ready: bool,
}

impl<C: DeviceChannel> Transport<C> {
    pub fn new(channel: C, reset: ResetSequence) -> Self {
        Self {
            channel,
            reset,
            ready: false,
        }
    }

    /// Writes `bytes`, resetting the controller first if this is the first
    /// write.
    ///
    /// # Errors
    ///
    /// Returns the channel error.  A failed reset is retried on the next call.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.ready {
            self.reset.run(&mut self.channel)?;
            self.ready = true;
        }
        self.channel.write_all(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
