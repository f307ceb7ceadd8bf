//! Message and program codec.
//!
//! Decode pipeline for a wire stream:
//!
//! ```text
//! wire bytes ─unscramble─▶ plain bytes ─frame─▶ frames ─registry─▶ messages
//! ```
//!
//! A frame whose opcode is not in the catalog becomes an [`UnknownChunk`] and
//! is carried through unchanged, so `encode(decode(bytes)) == bytes` holds for
//! any stream that decodes at all.
//!
//! A frame whose opcode *is* known but whose length disagrees with the catalog
//! is a [`ProtocolError::MalformedMessage`].  [`decode_program`] stops at the
//! first one; [`decode_program_lenient`] keeps the frame verbatim as an unknown
//! chunk, reports the error and resumes at the next frame.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::field::{decode_field, encode_field, FieldError};
use crate::protocol::frame::{frames, Frame};
use crate::protocol::messages::{LaserMessage, MessageDescriptor};
use crate::protocol::registry::registry;
use crate::protocol::scramble::{scramble_in_place, unscramble};

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A known opcode was framed with the wrong number of bytes.
    #[error(
        "malformed {name} message (opcode {opcode:02X?}) at offset {offset}: \
         expected {expected} bytes, got {actual}"
    )]
    MalformedMessage {
        name: &'static str,
        opcode: &'static [u8],
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A field value does not fit the field's declared width.
    #[error("{message}.{field}: {source}")]
    FieldOverflow {
        message: &'static str,
        field: &'static str,
        #[source]
        source: FieldError,
    },
}

// ── Program items ─────────────────────────────────────────────────────────────

/// Raw bytes of a frame that matched no catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownChunk(pub Vec<u8>);

impl UnknownChunk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for UnknownChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown [")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "0x{b:02x}")?;
        }
        f.write_str("]")
    }
}

/// One element of a program: a catalog message or a pass-through chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProgramItem {
    Message(LaserMessage),
    Unknown(UnknownChunk),
}

impl ProgramItem {
    /// The message, if this item is one.
    pub fn as_message(&self) -> Option<&LaserMessage> {
        match self {
            ProgramItem::Message(m) => Some(m),
            ProgramItem::Unknown(_) => None,
        }
    }
}

impl From<LaserMessage> for ProgramItem {
    fn from(msg: LaserMessage) -> Self {
        ProgramItem::Message(msg)
    }
}

impl fmt::Display for ProgramItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramItem::Message(m) => fmt::Display::fmt(m, f),
            ProgramItem::Unknown(c) => fmt::Display::fmt(c, f),
        }
    }
}

/// A complete job: the ordered items sent to the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub items: Vec<ProgramItem>,
}

impl Program {
    pub fn new(items: Vec<ProgramItem>) -> Self {
        Self { items }
    }

    /// Iterates over the catalog messages, skipping unknown chunks.
    pub fn messages(&self) -> impl Iterator<Item = &LaserMessage> {
        self.items.iter().filter_map(ProgramItem::as_message)
    }

    /// Number of unknown chunks in the program.
    pub fn unknown_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, ProgramItem::Unknown(_)))
            .count()
    }

    /// Checks that every field of every message fits its declared width.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProtocolError::FieldOverflow`] found.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.messages().try_for_each(validate_message)
    }

    /// Encodes the program into plain (unscrambled) bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FieldOverflow`] if any field is out of range.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        for item in &self.items {
            match item {
                ProgramItem::Message(m) => encode_message_into(m, &mut out)?,
                ProgramItem::Unknown(c) => out.extend_from_slice(&c.0),
            }
        }
        Ok(out)
    }

    /// Encodes and scrambles the program, ready for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FieldOverflow`] if any field is out of range.
    pub fn to_wire(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = self.encode()?;
        scramble_in_place(&mut out);
        Ok(out)
    }

    /// Unscrambles and decodes a wire stream, stopping at the first malformed
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedMessage`] on framing desync.
    pub fn from_wire(wire: &[u8]) -> Result<Self, ProtocolError> {
        decode_program(&unscramble(wire))
    }

    /// Unscrambles and decodes a wire stream, keeping malformed messages as
    /// unknown chunks.  See [`decode_program_lenient`].
    pub fn from_wire_lenient(wire: &[u8]) -> (Self, Vec<ProtocolError>) {
        decode_program_lenient(&unscramble(wire))
    }
}

// ── Message codec ─────────────────────────────────────────────────────────────

/// Appends the plain encoding of `msg` to `out`.
///
/// On error `out` may hold a partially written message; callers discard it.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldOverflow`] if a field is out of range.
pub fn encode_message_into(msg: &LaserMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let desc = msg.descriptor();
    out.extend_from_slice(desc.opcode);
    for (spec, value) in desc.fields.iter().zip(msg.values()) {
        encode_field(spec.kind, value, out).map_err(|source| ProtocolError::FieldOverflow {
            message: desc.name,
            field: spec.name,
            source,
        })?;
    }
    Ok(())
}

/// Encodes a single message into plain bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldOverflow`] if a field is out of range.
///
/// # Examples
///
/// ```rust
/// use laser_core::protocol::codec::encode_message;
/// use laser_core::protocol::messages::LaserMessage;
///
/// let bytes = encode_message(&LaserMessage::ChangeLayer { layer: 3 }).unwrap();
/// assert_eq!(bytes, [0xCA, 0x02, 0x03]);
/// ```
pub fn encode_message(msg: &LaserMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(msg.descriptor().wire_len());
    encode_message_into(msg, &mut out)?;
    Ok(out)
}

/// Checks every field of `msg` against its declared width.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldOverflow`] for the first field out of range.
pub fn validate_message(msg: &LaserMessage) -> Result<(), ProtocolError> {
    let desc = msg.descriptor();
    for (spec, value) in desc.fields.iter().zip(msg.values()) {
        spec.kind
            .check(value)
            .map_err(|source| ProtocolError::FieldOverflow {
                message: desc.name,
                field: spec.name,
                source,
            })?;
    }
    Ok(())
}

/// Decodes one framed message.
///
/// `frame.offset` is only used for error reporting.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] when the opcode is known but
/// the frame length disagrees with the catalog.
pub fn decode_frame(frame: Frame<'_>) -> Result<ProgramItem, ProtocolError> {
    let bytes = frame.bytes;
    let Some(desc) = registry().lookup(bytes) else {
        debug!(offset = frame.offset, opcode = ?bytes.first(), "unknown opcode");
        return Ok(ProgramItem::Unknown(UnknownChunk(bytes.to_vec())));
    };

    let malformed = || ProtocolError::MalformedMessage {
        name: desc.name,
        opcode: desc.opcode,
        offset: frame.offset,
        expected: desc.wire_len(),
        actual: bytes.len(),
    };

    // Literal opcode bytes past the dispatch bytes must match.
    let literal_len = desc.opcode.len().min(bytes.len());
    if bytes[2.min(literal_len)..literal_len] != desc.opcode[2.min(literal_len)..literal_len] {
        debug!(
            offset = frame.offset,
            name = desc.name,
            "opcode literal mismatch, keeping frame as unknown"
        );
        return Ok(ProgramItem::Unknown(UnknownChunk(bytes.to_vec())));
    }

    if bytes.len() != desc.wire_len() {
        return Err(malformed());
    }

    decode_fields(desc, &bytes[desc.opcode.len()..])
        .map(ProgramItem::Message)
        .ok_or_else(malformed)
}

fn decode_fields(desc: &MessageDescriptor, mut payload: &[u8]) -> Option<LaserMessage> {
    let mut values = Vec::with_capacity(desc.fields.len());
    for spec in desc.fields {
        let (head, rest) = payload.split_at(spec.kind.len());
        values.push(decode_field(spec.kind, head).ok()?);
        payload = rest;
    }
    LaserMessage::from_values(desc.kind, &values)
}

// ── Program codec ─────────────────────────────────────────────────────────────

/// Decodes a plain byte stream, stopping at the first malformed message.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] with the offending opcode and
/// byte offset.
pub fn decode_program(plain: &[u8]) -> Result<Program, ProtocolError> {
    let items = frames(plain)
        .map(decode_frame)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { items })
}

/// Decodes a plain byte stream, keeping malformed messages verbatim.
///
/// Every malformed frame is logged, stored as an [`UnknownChunk`], and its
/// error returned alongside the program.  Decoding resumes at the next frame,
/// so the returned program always re-encodes to `plain`.
pub fn decode_program_lenient(plain: &[u8]) -> (Program, Vec<ProtocolError>) {
    let mut items = Vec::new();
    let mut errors = Vec::new();
    for frame in frames(plain) {
        match decode_frame(frame) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!("{e}; keeping raw bytes");
                items.push(ProgramItem::Unknown(UnknownChunk(frame.bytes.to_vec())));
                errors.push(e);
            }
        }
    }
    (Program { items }, errors)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::field::FieldKind;
    use crate::protocol::frame::split_messages;
    use crate::protocol::messages::{MessageKind, CATALOG};

    fn decode_one(bytes: &[u8]) -> Result<ProgramItem, ProtocolError> {
        decode_frame(Frame { offset: 0, bytes })
    }

    /// Field values spread over each kind's legal range.
    fn sample_values(desc: &MessageDescriptor, seed: i64) -> Vec<i64> {
        desc.fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let span = f.kind.max_value() - f.kind.min_value();
                f.kind.min_value() + (seed * 7919 + i as i64 * 104_729) % (span + 1)
            })
            .collect()
    }

    #[test]
    fn test_every_catalog_message_round_trips() {
        for desc in CATALOG {
            for seed in [0, 1, 17, 9001] {
                let msg = LaserMessage::from_values(desc.kind, &sample_values(desc, seed)).unwrap();
                let bytes = encode_message(&msg).unwrap();
                assert_eq!(bytes.len(), desc.wire_len(), "{}", desc.name);
                assert_eq!(decode_one(&bytes).unwrap(), ProgramItem::Message(msg.clone()));
            }
        }
    }

    #[test]
    fn test_every_catalog_message_frames_as_one() {
        for desc in CATALOG {
            let values: Vec<i64> = desc.fields.iter().map(|f| f.kind.max_value()).collect();
            let msg = LaserMessage::from_values(desc.kind, &values).unwrap();
            let bytes = encode_message(&msg).unwrap();
            assert_eq!(split_messages(&bytes).len(), 1, "{}", desc.name);
        }
    }

    #[test]
    fn test_encode_decode_bytes_identity() {
        // Arrange: a hand-written MoveAbs to (10000, 0)
        let bytes = [0x88, 0x00, 0x00, 0x00, 0x4E, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00];

        // Act
        let item = decode_one(&bytes).unwrap();

        // Assert
        assert_eq!(item, ProgramItem::Message(LaserMessage::MoveAbs { x: 10_000, y: 0 }));
        assert_eq!(encode_message(item.as_message().unwrap()).unwrap(), bytes);
    }

    #[test]
    fn test_unknown_opcode_passes_through() {
        let bytes = [0x80, 0x11, 0x22];
        let item = decode_one(&bytes).unwrap();
        assert_eq!(item, ProgramItem::Unknown(UnknownChunk(bytes.to_vec())));

        let program = Program::new(vec![item]);
        assert_eq!(program.encode().unwrap(), bytes);
    }

    #[test]
    fn test_empty_frame_is_unknown_chunk() {
        let item = decode_one(&[]).unwrap();
        assert_eq!(item, ProgramItem::Unknown(UnknownChunk(Vec::new())));
    }

    #[test]
    fn test_unknown_second_byte_passes_through() {
        let bytes = [0xCA, 0x7E, 0x01];
        assert!(matches!(decode_one(&bytes).unwrap(), ProgramItem::Unknown(_)));
    }

    #[test]
    fn test_literal_mismatch_passes_through() {
        // E7 05 must be followed by the literal 00
        let bytes = [0xE7, 0x05, 0x01];
        assert_eq!(
            decode_one(&bytes).unwrap(),
            ProgramItem::Unknown(UnknownChunk(bytes.to_vec()))
        );
        assert_eq!(
            decode_one(&[0xE7, 0x05, 0x00]).unwrap(),
            ProgramItem::Message(LaserMessage::E705 {})
        );
    }

    #[test]
    fn test_short_message_is_malformed() {
        let err = decode_frame(Frame { offset: 42, bytes: &[0xCA, 0x02] }).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MalformedMessage {
                name: "ChangeLayer",
                opcode: &[0xCA, 0x02],
                offset: 42,
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_long_message_is_malformed() {
        let err = decode_one(&[0xF0, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_truncated_literal_opcode_is_malformed() {
        let err = decode_one(&[0xE7, 0x60, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn test_strict_decode_stops_at_malformed() {
        let plain = [0xF0, 0xCA, 0x02, 0xEB];
        let err = decode_program(&plain).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage { offset: 1, .. }));
    }

    #[test]
    fn test_lenient_decode_keeps_raw_bytes_and_continues() {
        // Arrange
        let plain = [0xF0, 0xCA, 0x02, 0xEB];

        // Act
        let (program, errors) = decode_program_lenient(&plain);

        // Assert
        assert_eq!(errors.len(), 1);
        assert_eq!(
            program.items,
            vec![
                ProgramItem::Message(LaserMessage::F0 {}),
                ProgramItem::Unknown(UnknownChunk(vec![0xCA, 0x02])),
                ProgramItem::Message(LaserMessage::Finish {}),
            ]
        );
        assert_eq!(program.encode().unwrap(), plain);
    }

    #[test]
    fn test_encode_overflow_names_message_and_field() {
        let msg = LaserMessage::LayerLaser1MaxPower { layer: 0, power: 20_000 };
        let err = encode_message(&msg).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldOverflow {
                message: "LayerLaser1MaxPower",
                field: "power",
                source: FieldError::Overflow {
                    kind: FieldKind::Power,
                    value: 20_000,
                    min: 0,
                    max: 16_383,
                },
            }
        );
        assert_eq!(validate_message(&msg), Err(err));
    }

    #[test]
    fn test_wire_round_trip_scrambles_and_restores() {
        // Arrange
        let program = Program::new(vec![
            LaserMessage::UploadFollows {}.into(),
            LaserMessage::LayerSpeed { layer: 1, speed: 20_000 }.into(),
            ProgramItem::Unknown(UnknownChunk(vec![0x81, 0x05])),
            LaserMessage::MoveRel { dx: -5, dy: 8192 }.into(),
            LaserMessage::Eof {}.into(),
        ]);

        // Act
        let wire = program.to_wire().unwrap();
        let decoded = Program::from_wire(&wire).unwrap();

        // Assert
        assert_ne!(wire, program.encode().unwrap());
        assert_eq!(decoded, program);
        assert_eq!(decoded.unknown_count(), 1);
        assert_eq!(decoded.messages().count(), 4);
    }

    #[test]
    fn test_unknown_chunk_display() {
        let chunk = UnknownChunk(vec![0x80, 0x0a]);
        assert_eq!(chunk.to_string(), "unknown [0x80, 0x0a]");
    }

    #[test]
    fn test_from_values_kind_matches_descriptor() {
        let msg = LaserMessage::from_values(MessageKind::DA01, &[800, 1, 2]).unwrap();
        assert_eq!(encode_message(&msg).unwrap()[..2], [0xDA, 0x01]);
    }
}
