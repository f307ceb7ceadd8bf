//! Fixed-width, 7-bit-per-byte integer fields.
//!
//! Every field in the protocol is a big-endian base-128 number: each byte
//! carries seven value bits, most significant digit first.  Because payload
//! bytes never have the top bit set, a field can never be mistaken for the
//! start of the next message (see [`crate::protocol::frame`]).
//!
//! Signed fields use a bias rather than two's complement: a raw value above
//! half the range is shifted down by the full range.  The comparison is a
//! strict `>`, so the raw midpoint decodes as a *positive* number.  The legal
//! signed range is therefore `-(2^(k-1) - 1) ..= 2^(k-1)` with `k = 7 * len`,
//! which is exactly what [`FieldKind::min_value`] and
//! [`FieldKind::max_value`] report.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the field codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// A value does not fit the field's declared width.
    #[error("value {value} does not fit {kind} field (allowed {min}..={max})")]
    Overflow {
        kind: FieldKind,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The byte slice handed to [`decode_field`] has the wrong length.
    #[error("field needs {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// The typed field kinds used by the message catalog.
///
/// Each kind is fully described by its serialized length and signedness; the
/// distinct names exist so that message definitions read like the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Absolute coordinate in device units (µm).  5 bytes, unsigned.
    Abs,
    /// Relative delta in device units.  2 bytes, signed.
    Rel,
    /// Duration in milliseconds.  5 bytes, unsigned.
    Millis,
    /// Single-byte value of unknown meaning.  1 byte, unsigned.
    Flag,
    /// Two-byte value of unknown meaning.  2 bytes, unsigned.
    Short,
    /// Output device / channel selector.  1 byte, unsigned.
    Device,
    /// Layer index.  1 byte, unsigned.
    Layer,
    /// Power in device power units.  2 bytes, unsigned.
    Power,
    /// Speed in device units.  5 bytes, unsigned.
    Speed,
    /// Packed 24-bit RGB colour.  5 bytes, unsigned.
    Color,
}

impl FieldKind {
    /// Serialized length in bytes.
    pub const fn len(self) -> usize {
        match self {
            FieldKind::Flag | FieldKind::Device | FieldKind::Layer => 1,
            FieldKind::Rel | FieldKind::Short | FieldKind::Power => 2,
            FieldKind::Abs | FieldKind::Millis | FieldKind::Speed | FieldKind::Color => 5,
        }
    }

    /// Whether the field carries a biased signed value.
    pub const fn is_signed(self) -> bool {
        matches!(self, FieldKind::Rel)
    }

    /// Number of value bits (`7 * len`).
    pub const fn bits(self) -> u32 {
        7 * self.len() as u32
    }

    /// Smallest value that survives an encode/decode round trip.
    pub const fn min_value(self) -> i64 {
        if self.is_signed() {
            -((1i64 << (self.bits() - 1)) - 1)
        } else {
            0
        }
    }

    /// Largest value that survives an encode/decode round trip.
    pub const fn max_value(self) -> i64 {
        if self.is_signed() {
            1i64 << (self.bits() - 1)
        } else {
            (1i64 << self.bits()) - 1
        }
    }

    /// Returns `true` when `value` can be encoded into this field.
    pub const fn accepts(self, value: i64) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Returns `Ok(value)` or the matching [`FieldError::Overflow`].
    pub fn check(self, value: i64) -> Result<i64, FieldError> {
        if self.accepts(value) {
            Ok(value)
        } else {
            Err(FieldError::Overflow {
                kind: self,
                value,
                min: self.min_value(),
                max: self.max_value(),
            })
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Abs => "abs",
            FieldKind::Rel => "rel",
            FieldKind::Millis => "millis",
            FieldKind::Flag => "flag",
            FieldKind::Short => "short",
            FieldKind::Device => "device",
            FieldKind::Layer => "layer",
            FieldKind::Power => "power",
            FieldKind::Speed => "speed",
            FieldKind::Color => "color",
        };
        write!(f, "{name}/{}{}", self.len(), if self.is_signed() { "s" } else { "u" })
    }
}

/// Decodes one field from exactly `kind.len()` bytes.
///
/// The bytes are accumulated as-is (`value << 7 | byte`); callers pass
/// already unscrambled and framed payload bytes whose top bit is clear.
///
/// # Errors
///
/// Returns [`FieldError::LengthMismatch`] when `bytes.len() != kind.len()`.
pub fn decode_field(kind: FieldKind, bytes: &[u8]) -> Result<i64, FieldError> {
    if bytes.len() != kind.len() {
        return Err(FieldError::LengthMismatch {
            expected: kind.len(),
            actual: bytes.len(),
        });
    }

    let mut value = bytes
        .iter()
        .fold(0i64, |acc, &b| (acc << 7) | i64::from(b));

    if kind.is_signed() && value > (1i64 << (kind.bits() - 1)) {
        value -= 1i64 << kind.bits();
    }
    Ok(value)
}

/// Appends the encoding of `value` to `out`.
///
/// # Errors
///
/// Returns [`FieldError::Overflow`] if `value` is outside the field's range;
/// nothing is written in that case.
///
/// # Examples
///
/// ```rust
/// use laser_core::protocol::field::{decode_field, encode_field, FieldKind};
///
/// let mut buf = Vec::new();
/// encode_field(FieldKind::Rel, -3, &mut buf).unwrap();
/// assert_eq!(buf, [0x7F, 0x7D]);
/// assert_eq!(decode_field(FieldKind::Rel, &buf).unwrap(), -3);
/// ```
pub fn encode_field(kind: FieldKind, value: i64, out: &mut Vec<u8>) -> Result<(), FieldError> {
    let mut v = kind.check(value)?;
    if v < 0 {
        v += 1i64 << kind.bits();
    }

    let start = out.len();
    for _ in 0..kind.len() {
        out.push((v & 0x7F) as u8);
        v >>= 7;
    }
    out[start..].reverse();
    Ok(())
}

// ── Colour packing ────────────────────────────────────────────────────────────

/// An RGB colour as stored in a [`FieldKind::Color`] field.
///
/// Red occupies the low byte of the packed value, green the middle byte and
/// blue the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Unpacks the channel bytes from a raw colour field value.
    pub fn from_packed(value: i64) -> Self {
        Self {
            red: (value & 0xFF) as u8,
            green: ((value >> 8) & 0xFF) as u8,
            blue: ((value >> 16) & 0xFF) as u8,
        }
    }

    /// Builds a colour from channel fractions in `0.0..=1.0`.
    ///
    /// Each channel is scaled by 255 and truncated; out-of-range fractions are
    /// clamped.
    pub fn from_fractions(rgb: [f64; 3]) -> Self {
        let channel = |f: f64| (f.clamp(0.0, 1.0) * 255.0) as u8;
        Self {
            red: channel(rgb[0]),
            green: channel(rgb[1]),
            blue: channel(rgb[2]),
        }
    }

    /// Packs the channels into a colour field value.
    pub fn packed(self) -> i64 {
        i64::from(self.red) | (i64::from(self.green) << 8) | (i64::from(self.blue) << 16)
    }

    /// Channel intensities as fractions in `0.0..=1.0`.
    pub fn fractions(self) -> [f64; 3] {
        [
            f64::from(self.red) / 255.0,
            f64::from(self.green) / 255.0,
            f64::from(self.blue) / 255.0,
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
