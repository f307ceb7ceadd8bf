//! Byte-level obfuscation applied to the whole wire stream.
//!
//! Every byte is transformed on its own with a fixed magic constant; there is
//! no state carried from one byte to the next, so a stream can be split at any
//! point and each piece scrambled independently.
//!
//! Decode direction, for a wire byte `x`:
//!
//! ```text
//! b = (x - 1) mod 256 XOR MAGIC
//! plain = swap bit 7 and bit 0 of b
//! ```
//!
//! The encode direction applies the inverse steps in reverse order.

/// Magic constant XOR-ed into every byte.
pub const MAGIC: u8 = 0x88;

/// Swaps bit 7 and bit 0, leaving bits 1–6 untouched.  Self-inverse.
#[inline]
fn swap_outer_bits(b: u8) -> u8 {
    (b & 0x7E) | ((b >> 7) & 0x01) | ((b << 7) & 0x80)
}

/// Scrambles one plain byte into its wire representation.
#[inline]
pub fn scramble_byte(plain: u8) -> u8 {
    (swap_outer_bits(plain) ^ MAGIC).wrapping_add(1)
}

/// Recovers the plain byte from one wire byte.
#[inline]
pub fn unscramble_byte(wire: u8) -> u8 {
    swap_outer_bits(wire.wrapping_sub(1) ^ MAGIC)
}

/// Scrambles a plain byte stream for transmission.
///
/// # Examples
///
/// ```rust
/// use laser_core::protocol::scramble::{scramble, unscramble};
///
/// let plain = [0xD8, 0x12, 0xF0];
/// assert_eq!(unscramble(&scramble(&plain)), plain);
/// ```
pub fn scramble(plain: &[u8]) -> Vec<u8> {
    plain.iter().copied().map(scramble_byte).collect()
}

/// Unscrambles a wire byte stream.
pub fn unscramble(wire: &[u8]) -> Vec<u8> {
    wire.iter().copied().map(unscramble_byte).collect()
}

/// Scrambles `buf` in place.
pub fn scramble_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = scramble_byte(*b);
    }
}

/// Unscrambles `buf` in place.
pub fn unscramble_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = unscramble_byte(*b);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
