//! DecodeFileUseCase: decode, re-encode and verify a program file.
//!
//! Decoding followed by encoding must give back the input byte for byte.
//! This is the primary self-test of the codec against captured files: a
//! mismatch means the catalog disagrees with what the vendor software wrote.

use laser_core::program::simulator::Simulator;
use laser_core::{Program, ProtocolError};
use thiserror::Error;
use tracing::{info, warn};

/// Error type for the decode use case.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeFileError {
    /// Strict decoding hit a malformed message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The re-encoded stream differs from the input.
    #[error(
        "re-encoded program differs from input at byte {offset} \
         (input {input_len} bytes, output {output_len} bytes)"
    )]
    RoundTripMismatch {
        offset: usize,
        input_len: usize,
        output_len: usize,
    },
}

/// Outcome of a successful decode.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub program: Program,
    /// Malformed messages kept as raw bytes (lenient mode only).
    pub diagnostics: Vec<ProtocolError>,
    /// The re-encoded, re-scrambled program.  Equal to the input.
    pub output: Vec<u8>,
}

/// Decodes `wire`, re-encodes the result and verifies it matches.
///
/// With `strict` the first malformed message is an error; otherwise it is
/// kept as an unknown chunk and reported in [`DecodeReport::diagnostics`].
///
/// # Errors
///
/// Returns [`DecodeFileError::Protocol`] in strict mode on a malformed
/// message, and [`DecodeFileError::RoundTripMismatch`] if re-encoding does not
/// reproduce `wire`.
pub fn decode_and_verify(wire: &[u8], strict: bool) -> Result<DecodeReport, DecodeFileError> {
    let (program, diagnostics) = if strict {
        (Program::from_wire(wire)?, Vec::new())
    } else {
        Program::from_wire_lenient(wire)
    };
    for d in &diagnostics {
        warn!("{d}");
    }

    let output = program.to_wire()?;
    if output != wire {
        let offset = output
            .iter()
            .zip(wire)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| output.len().min(wire.len()));
        return Err(DecodeFileError::RoundTripMismatch {
            offset,
            input_len: wire.len(),
            output_len: output.len(),
        });
    }

    info!(
        items = program.items.len(),
        unknown = program.unknown_count(),
        malformed = diagnostics.len(),
        bytes = wire.len(),
        "decoded program"
    );
    Ok(DecodeReport {
        program,
        diagnostics,
        output,
    })
}

/// One line per item, followed by the simulator summary.
pub fn render_listing(program: &Program) -> String {
    let mut out = String::new();
    for item in &program.items {
        out.push_str(&item.to_string());
        out.push('\n');
    }
    let mut sim = Simulator::new();
    sim.run(program);
    out.push_str(&format!("# {}\n", sim.summary()));
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
