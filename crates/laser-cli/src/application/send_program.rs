//! SendProgramUseCase: check a program file and write it to the controller.
//!
//! The bytes are decoded strictly before anything is sent; the controller has
//! no way to report a broken stream, so a file that does not decode cleanly
//! is refused.  The transport resets the controller before the first write.

use laser_core::{LaserMessage, Program, ProtocolError};
use thiserror::Error;
use tracing::{info, warn};

use crate::infrastructure::transport::{DeviceChannel, Transport, TransportError};

/// Error type for the send use case.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("refusing to send invalid program: {0}")]
    InvalidProgram(#[from] ProtocolError),

    #[error("refusing to send an empty program")]
    Empty,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub bytes: usize,
    pub messages: usize,
}

/// Decodes `wire` strictly, then writes it through `transport`.
///
/// # Errors
///
/// Returns [`SendError::InvalidProgram`] or [`SendError::Empty`] before
/// touching the device, or [`SendError::Transport`] if the write fails.
pub fn send_program<C: DeviceChannel>(
    transport: &mut Transport<C>,
    wire: &[u8],
) -> Result<SendReport, SendError> {
    if wire.is_empty() {
        return Err(SendError::Empty);
    }
    let program = Program::from_wire(wire)?;
    if program.messages().last() != Some(&LaserMessage::Eof {}) {
        warn!("program does not end with an end-of-file marker");
    }

    transport.write(wire)?;

    let report = SendReport {
        bytes: wire.len(),
        messages: program.items.len(),
    };
    info!(bytes = report.bytes, messages = report.messages, "program sent");
    Ok(report)
}
