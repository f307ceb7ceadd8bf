//! Opcode lookup table built from the message catalog.
//!
//! Dispatch uses at most two bytes.  The first byte of a frame selects either
//! a single-byte opcode directly or a sub-table keyed on the second byte.
//! Opcode bytes beyond the second are fixed literals; they are checked against
//! the frame by the codec but never take part in dispatch.
//!
//! The table is built once on first use and is read-only afterwards, so one
//! instance is shared by every decode call.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::protocol::messages::{MessageDescriptor, CATALOG};

/// Result of looking up the first opcode byte.
#[derive(Debug, Clone)]
enum Slot {
    /// Single-byte opcode.
    Single(&'static MessageDescriptor),
    /// Multi-byte opcodes sharing this first byte, keyed on the second byte.
    Table(HashMap<u8, &'static MessageDescriptor>),
}

/// Two-level opcode table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    slots: HashMap<u8, Slot>,
}

impl Registry {
    /// Builds a registry from `descriptors`.
    ///
    /// When two descriptors claim the same dispatch key the first one wins.
    /// A first byte used both as a single-byte opcode and as a sub-table
    /// prefix keeps whichever was registered first.
    pub fn from_descriptors(descriptors: &'static [MessageDescriptor]) -> Self {
        let mut registry = Self::default();
        for desc in descriptors {
            if !registry.register(desc) {
                tracing::warn!(
                    name = desc.name,
                    "opcode {:02X?} already registered; entry ignored",
                    desc.opcode
                );
            }
        }
        registry
    }

    /// Adds one descriptor.  Returns `false` when its dispatch key is taken
    /// (or its opcode is empty) and nothing was added.
    fn register(&mut self, desc: &'static MessageDescriptor) -> bool {
        let Some(&first) = desc.opcode.first() else {
            return false;
        };
        match desc.opcode.get(1) {
            None if self.slots.contains_key(&first) => false,
            None => {
                self.slots.insert(first, Slot::Single(desc));
                true
            }
            Some(&second) => match self
                .slots
                .entry(first)
                .or_insert_with(|| Slot::Table(HashMap::new()))
            {
                Slot::Table(table) => match table.entry(second) {
                    Entry::Vacant(slot) => {
                        slot.insert(desc);
                        true
                    }
                    Entry::Occupied(_) => false,
                },
                Slot::Single(_) => false,
            },
        }
    }

    /// Finds the descriptor a frame dispatches to.
    ///
    /// Returns `None` when the first byte is unknown, or when it names a
    /// sub-table and the second byte is missing or unknown.
    pub fn lookup(&self, frame: &[u8]) -> Option<&'static MessageDescriptor> {
        match self.slots.get(frame.first()?)? {
            Slot::Single(desc) => Some(*desc),
            Slot::Table(table) => table.get(frame.get(1)?).copied(),
        }
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .map(|slot| match slot {
                Slot::Single(_) => 1,
                Slot::Table(table) => table.len(),
            })
            .sum()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The process-wide registry for the full [`CATALOG`].
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::from_descriptors(CATALOG))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::field::FieldKind;
    use crate::protocol::messages::{FieldSpec, MessageKind};

    #[test]
    fn test_every_catalog_entry_resolves_to_itself() {
        let reg = registry();
        assert_eq!(reg.len(), CATALOG.len());
        for desc in CATALOG {
            let found = reg.lookup(desc.opcode).expect(desc.name);
            assert_eq!(found.kind, desc.kind);
        }
    }

    #[test]
    fn test_single_byte_dispatch() {
        let found = registry().lookup(&[0x88, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(found.kind, MessageKind::MoveAbs);
    }

    #[test]
    fn test_second_byte_dispatch() {
        assert_eq!(registry().lookup(&[0xCA, 0x02, 0x00]).unwrap().kind, MessageKind::ChangeLayer);
        assert_eq!(registry().lookup(&[0xCA, 0x06]).unwrap().kind, MessageKind::LayerColor);
    }

    #[test]
    fn test_unknown_first_byte_is_none() {
        assert!(registry().lookup(&[0x80, 0x01]).is_none());
        assert!(registry().lookup(&[]).is_none());
    }

    #[test]
    fn test_unknown_second_byte_is_none() {
        assert!(registry().lookup(&[0xE7, 0x7F]).is_none());
    }

    #[test]
    fn test_missing_second_byte_is_none() {
        assert!(registry().lookup(&[0xE7]).is_none());
    }

    #[test]
    fn test_conflicting_entries_keep_first() {
        static DESCS: [MessageDescriptor; 3] = [
            MessageDescriptor {
                kind: MessageKind::E4,
                name: "first",
                opcode: &[0xE4],
                fields: &[],
            },
            MessageDescriptor {
                kind: MessageKind::E300,
                name: "second",
                opcode: &[0xE4, 0x01],
                fields: &[FieldSpec { name: "v", kind: FieldKind::Flag }],
            },
            MessageDescriptor {
                kind: MessageKind::Eof,
                name: "third",
                opcode: &[0xE4],
                fields: &[],
            },
        ];
        let reg = Registry::from_descriptors(&DESCS);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup(&[0xE4, 0x01]).unwrap().name, "first");
    }

    #[test]
    fn test_duplicate_second_byte_keeps_first() {
        static DESCS: [MessageDescriptor; 3] = [
            MessageDescriptor {
                kind: MessageKind::E700,
                name: "first",
                opcode: &[0xE7, 0x00],
                fields: &[],
            },
            MessageDescriptor {
                kind: MessageKind::E4,
                name: "second",
                opcode: &[0xE7, 0x00],
                fields: &[],
            },
            MessageDescriptor {
                kind: MessageKind::Eof,
                name: "other",
                opcode: &[0xE7, 0x01],
                fields: &[],
            },
        ];
        // Arrange
        let mut reg = Registry::default();

        // Act
        let accepted: Vec<bool> = DESCS.iter().map(|d| reg.register(d)).collect();

        // Assert
        assert_eq!(accepted, [true, false, true]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.lookup(&[0xE7, 0x00]).unwrap().name, "first");
        assert_eq!(reg.lookup(&[0xE7, 0x01]).unwrap().name, "other");
    }
}
