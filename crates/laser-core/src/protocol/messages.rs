//! The closed catalog of protocol messages.
//!
//! Every message is an opcode of one to four bytes followed by a fixed list of
//! [`FieldKind`]-typed fields.  The catalog is declared once with the
//! `catalog!` macro below, which generates:
//!
//! - [`MessageKind`] – a field-less tag per message, usable as a table index.
//! - [`LaserMessage`] – one struct variant per message with named `i64` fields.
//! - [`CATALOG`] – the static descriptor table (opcode bytes and field schema)
//!   the registry and codec are driven by.
//!
//! Several opcodes were captured from the machine's own software without a
//! known meaning.  They are named after their opcode bytes and passed through
//! unchanged.

use std::fmt;

use crate::protocol::field::{FieldKind, Rgb};

// ── Descriptors ───────────────────────────────────────────────────────────────

/// Name and type of one message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub kind: MessageKind,
    pub name: &'static str,
    /// Opcode bytes; the first has the top bit set, the rest are literals.
    pub opcode: &'static [u8],
    /// Fields in wire order.
    pub fields: &'static [FieldSpec],
}

impl MessageDescriptor {
    /// Total number of payload bytes taken by the fields.
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.kind.len()).sum()
    }

    /// Total encoded length: opcode plus fields.
    pub fn wire_len(&self) -> usize {
        self.opcode.len() + self.payload_len()
    }
}

// ── Catalog macro ─────────────────────────────────────────────────────────────

macro_rules! catalog {
    ($(
        $(#[$meta:meta])*
        $name:ident = [$($op:literal),+] { $($field:ident : $kind:ident),* $(,)? }
    ),* $(,)?) => {
        /// Field-less tag identifying a catalog entry.
        ///
        /// `kind as usize` is the entry's index in [`CATALOG`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageKind {
            $($name,)*
        }

        /// A decoded or constructed protocol message.
        ///
        /// Field values are the logical integers carried on the wire; range
        /// checks happen when the message is encoded.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum LaserMessage {
            $(
                $(#[$meta])*
                $name { $($field: i64,)* },
            )*
        }

        /// Every message the codec knows, in [`MessageKind`] order.
        pub static CATALOG: &[MessageDescriptor] = &[
            $(
                MessageDescriptor {
                    kind: MessageKind::$name,
                    name: stringify!($name),
                    opcode: &[$($op),+],
                    fields: &[$(FieldSpec { name: stringify!($field), kind: FieldKind::$kind }),*],
                },
            )*
        ];

        impl LaserMessage {
            /// The tag of this message.
            pub fn kind(&self) -> MessageKind {
                match self {
                    $(LaserMessage::$name { .. } => MessageKind::$name,)*
                }
            }

            /// Field values in wire order.
            pub fn values(&self) -> Vec<i64> {
                match self {
                    $(LaserMessage::$name { $($field,)* } => vec![$(*$field),*],)*
                }
            }

            /// Builds a message from field values in wire order.
            ///
            /// Returns `None` when `values` has the wrong arity for `kind`.
            pub fn from_values(kind: MessageKind, values: &[i64]) -> Option<Self> {
                if values.len() != kind.descriptor().fields.len() {
                    return None;
                }
                #[allow(unused_mut, unused_variables)]
                let mut it = values.iter().copied();
                let msg = match kind {
                    $(MessageKind::$name => LaserMessage::$name { $($field: it.next()?,)* },)*
                };
                Some(msg)
            }
        }
    };
}

catalog! {
    // ── Motion ───────────────────────────────────────────────────────────────
    /// Travel (laser off) to an absolute position.
    MoveAbs = [0x88] { x: Abs, y: Abs },
    /// Travel by a relative offset.
    MoveRel = [0x89] { dx: Rel, dy: Rel },
    /// Travel horizontally by a relative distance.
    MoveHorz = [0x8A] { distance: Rel },
    /// Travel vertically by a relative distance.
    MoveVert = [0x8B] { distance: Rel },
    /// Cut (laser on) to an absolute position.
    CutAbs = [0xA8] { x: Abs, y: Abs },
    /// Cut by a relative offset.
    CutRel = [0xA9] { dx: Rel, dy: Rel },
    /// Cut horizontally by a relative distance.
    CutHorz = [0xAA] { distance: Rel },
    /// Cut vertically by a relative distance.
    CutVert = [0xAB] { distance: Rel },

    // ── Power and delays ─────────────────────────────────────────────────────
    Laser1MinPower = [0xC6, 0x01] { power: Power },
    Laser1MaxPower = [0xC6, 0x02] { power: Power },
    /// Delay after switching the laser on.
    CutOpenDelay = [0xC6, 0x12] { ms: Millis },
    /// Delay after switching the laser off.
    CutCloseDelay = [0xC6, 0x13] { ms: Millis },
    Laser2MinPower = [0xC6, 0x21] { power: Power },
    Laser2MaxPower = [0xC6, 0x22] { power: Power },
    LayerLaser1MinPower = [0xC6, 0x31] { layer: Layer, power: Power },
    LayerLaser1MaxPower = [0xC6, 0x32] { layer: Layer, power: Power },
    LayerLaser2MinPower = [0xC6, 0x41] { layer: Layer, power: Power },
    LayerLaser2MaxPower = [0xC6, 0x42] { layer: Layer, power: Power },
    CutPower1 = [0xC6, 0x50] { power: Power },
    CutPower2 = [0xC6, 0x51] { power: Power },

    // ── Speed ────────────────────────────────────────────────────────────────
    CutSpeed = [0xC9, 0x02] { speed: Speed },
    LayerSpeed = [0xC9, 0x04] { layer: Layer, speed: Speed },

    // ── Layer selection and properties ───────────────────────────────────────
    /// Selects an output channel on the controller.
    EnableDevice = [0xCA, 0x01] { device: Device },
    /// Makes `layer` the active layer for the following motion.
    ChangeLayer = [0xCA, 0x02] { layer: Layer },
    CA03 = [0xCA, 0x03] { unknown: Flag },
    LayerColor = [0xCA, 0x06] { layer: Layer, color: Color },
    CA10 = [0xCA, 0x10] { unknown: Flag },
    /// Index of the last layer (layer count minus one).
    LayerCount = [0xCA, 0x22] { layer_count: Layer },
    LayerCA41 = [0xCA, 0x41] { layer: Layer, u0: Flag },

    // ── Job control ──────────────────────────────────────────────────────────
    /// End of file marker.
    Eof = [0xD7] {},
    LightRed = [0xD8, 0x00] {},
    /// Announces that a program upload follows.
    UploadFollows = [0xD8, 0x12] {},
    DA01 = [0xDA, 0x01] { a: Short, x: Abs, y: Abs },
    E300 = [0xE3, 0x00] {},
    E4 = [0xE4] {},

    // ── Job geometry (0xE7 family) ───────────────────────────────────────────
    E700 = [0xE7, 0x00] {},
    Laser1TopLeft = [0xE7, 0x03] { x: Abs, y: Abs },
    E704 = [0xE7, 0x04] { a: Short, b: Short, x: Abs, y: Abs },
    E705 = [0xE7, 0x05, 0x00] {},
    Feedrate = [0xE7, 0x06] { x: Abs, y: Abs },
    Laser1BottomRight = [0xE7, 0x07] { x: Abs, y: Abs },
    E708 = [0xE7, 0x08] { unknown_a: Short, unknown_b: Short, x: Abs, y: Abs },
    E70A = [0xE7, 0x0A] { a: Abs },
    E70B = [0xE7, 0x0B, 0x00] {},
    E713 = [0xE7, 0x13] { a: Abs, b: Abs },
    E717 = [0xE7, 0x17] { a: Abs, b: Abs },
    E723 = [0xE7, 0x23] { a: Abs, b: Abs },
    E724 = [0xE7, 0x24, 0x00] {},
    E732 = [0xE7, 0x32] { x: Abs, y: Abs },
    E737 = [0xE7, 0x37] { a: Abs, b: Abs },
    E738 = [0xE7, 0x38, 0x00] {},
    Laser2TopLeft = [0xE7, 0x50] { x: Abs, y: Abs },
    Laser2BottomRight = [0xE7, 0x51] { x: Abs, y: Abs },
    LayerLaser1TopLeft = [0xE7, 0x52] { layer: Layer, x: Abs, y: Abs },
    LayerLaser1BottomRight = [0xE7, 0x53] { layer: Layer, x: Abs, y: Abs },
    PenYOffset = [0xE7, 0x54] { device: Device, y: Abs },
    LaserYOffset = [0xE7, 0x55] { device: Device, y: Abs },
    E760 = [0xE7, 0x60, 0x00, 0x00] {},
    LayerLaser2TopLeft = [0xE7, 0x61] { layer: Layer, x: Abs, y: Abs },
    LayerLaser2BottomRight = [0xE7, 0x62] { layer: Layer, x: Abs, y: Abs },

    EA00 = [0xEA, 0x00] {},
    /// Marks the end of the cut data.
    Finish = [0xEB] {},

    // ── Start / origin (0xF0–0xF2 family) ────────────────────────────────────
    F0 = [0xF0] {},
    Start0 = [0xF1, 0x00, 0x00] {},
    Start1 = [0xF1, 0x01, 0x00] {},
    Start2 = [0xF1, 0x02, 0x00] {},
    Offset = [0xF1, 0x03] { x: Abs, y: Abs },
    F200 = [0xF2, 0x00, 0x00] {},
    Offset2 = [0xF2, 0x03] { x: Abs, y: Abs },
    BottomRight = [0xF2, 0x04] { x: Abs, y: Abs },
    F205 = [0xF2, 0x05] { a: Short, b: Short, x: Abs, y: Abs },
    F206 = [0xF2, 0x06] { x: Abs, y: Abs },
    F207 = [0xF2, 0x07, 0x00] {},
    F208 = [0xF2, 0x08] { x: Abs, y: Abs },
}

impl MessageKind {
    /// The catalog entry for this kind.
    pub fn descriptor(self) -> &'static MessageDescriptor {
        &CATALOG[self as usize]
    }
}

impl LaserMessage {
    /// The catalog entry for this message.
    pub fn descriptor(&self) -> &'static MessageDescriptor {
        self.kind().descriptor()
    }

    /// The message name as declared in the catalog.
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// The opcode bytes of this message.
    pub fn opcode(&self) -> &'static [u8] {
        self.descriptor().opcode
    }
}

impl fmt::Display for LaserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.descriptor();
        f.write_str(desc.name)?;
        for (spec, value) in desc.fields.iter().zip(self.values()) {
            match spec.kind {
                FieldKind::Color => {
                    let c = Rgb::from_packed(value);
                    write!(f, " {}=#{:02X}{:02X}{:02X}", spec.name, c.red, c.green, c.blue)?;
                }
                FieldKind::Device | FieldKind::Flag => write!(f, " {}=0x{value:02X}", spec.name)?,
                _ => write!(f, " {}={value}", spec.name)?,
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
