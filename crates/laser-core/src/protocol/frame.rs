//! Splits an unscrambled byte stream into messages.
//!
//! A message is one opcode byte with the top bit set followed by any number of
//! payload bytes with the top bit clear.  The first byte of the stream always
//! opens a message, whatever its top bit; every later byte with the top bit set
//! closes the open message and opens the next one.  There is no length prefix
//! and no checksum, so the top bit is the only resynchronisation point.

/// One framed message: its bytes and the offset of its first byte in the
/// original stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Byte offset of `bytes[0]` within the framed stream.
    pub offset: usize,
    /// Opcode and payload bytes.
    pub bytes: &'a [u8],
}

/// Returns `true` when `b` starts a new message.
#[inline]
pub fn is_message_start(b: u8) -> bool {
    b & 0x80 != 0
}

/// Iterator over the frames of a byte stream, see [`frames`].
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        // The first byte belongs to this frame unconditionally.
        let len = self.data[start + 1..]
            .iter()
            .position(|&b| is_message_start(b))
            .map_or(self.data.len() - start, |n| n + 1);
        self.pos = start + len;
        Some(Frame {
            offset: start,
            bytes: &self.data[start..start + len],
        })
    }
}

/// Lazily frames `data`.  The final open message is yielded once input ends.
pub fn frames(data: &[u8]) -> Frames<'_> {
    Frames { data, pos: 0 }
}

/// Frames `data` eagerly.
///
/// # Examples
///
/// ```rust
/// use laser_core::protocol::frame::split_messages;
///
/// let data = [0xF0, 0xD8, 0x12, 0x88, 0x00, 0x01];
/// let msgs: Vec<&[u8]> = split_messages(&data).iter().map(|f| f.bytes).collect();
/// let expected: Vec<&[u8]> = vec![&[0xF0][..], &[0xD8, 0x12][..], &[0x88, 0x00, 0x01][..]];
/// assert_eq!(msgs, expected);
/// ```
pub fn split_messages(data: &[u8]) -> Vec<Frame<'_>> {
    frames(data).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
