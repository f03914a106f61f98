// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The static association between MIDI note numbers and logical pads.
//!
//! The table is built once from configuration and shared read-only. Every mapped
//! note resolves to exactly one pad and every pad to exactly one note, so the two
//! lookups are inverses of each other over the mapped subset.

use std::collections::HashMap;
use std::fmt;

use midly::num::u7;

/// A logical pad identifier, e.g. `pad-1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pad(String);

impl Pad {
    /// Creates a new pad identifier.
    pub fn new(id: impl Into<String>) -> Pad {
        Pad(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pad {
    fn from(id: &str) -> Pad {
        Pad::new(id)
    }
}

/// Errors raised while building a mapping table.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("note {0} is outside of the MIDI note range (0-127)")]
    InvalidNote(u8),

    #[error("pad {pad} is mapped to both note {first} and note {second}")]
    DuplicatePad { pad: Pad, first: u8, second: u8 },

    #[error("note {note} is mapped to both {first} and {second}")]
    DuplicateNote { note: u8, first: Pad, second: Pad },
}

/// Bidirectional note <-> pad lookup.
#[derive(Debug, Default)]
pub struct MappingTable {
    note_to_pad: HashMap<u8, Pad>,
    pad_to_note: HashMap<Pad, u8>,
}

impl MappingTable {
    /// Builds a mapping table from (note, pad) pairs. Any ambiguity is rejected
    /// outright rather than resolved by declaration order.
    pub fn new<I>(entries: I) -> Result<MappingTable, MappingError>
    where
        I: IntoIterator<Item = (u8, Pad)>,
    {
        let mut table = MappingTable::default();

        for (note, pad) in entries {
            let note = u8::from(u7::try_from(note).ok_or(MappingError::InvalidNote(note))?);

            if let Some(existing) = table.note_to_pad.get(&note) {
                return Err(MappingError::DuplicateNote {
                    note,
                    first: existing.clone(),
                    second: pad,
                });
            }
            if let Some(&existing) = table.pad_to_note.get(&pad) {
                return Err(MappingError::DuplicatePad {
                    pad,
                    first: existing,
                    second: note,
                });
            }

            table.note_to_pad.insert(note, pad.clone());
            table.pad_to_note.insert(pad, note);
        }

        Ok(table)
    }

    /// Returns the pad a note is mapped to, if any.
    pub fn pad_for_note(&self, note: u8) -> Option<&Pad> {
        self.note_to_pad.get(&note)
    }

    /// Returns the note a pad is mapped to, if any.
    pub fn note_for_pad(&self, pad: &Pad) -> Option<u8> {
        self.pad_to_note.get(pad).copied()
    }

    /// Returns all mappings ordered by note number.
    pub fn entries(&self) -> Vec<(u8, &Pad)> {
        let mut entries: Vec<(u8, &Pad)> = self
            .note_to_pad
            .iter()
            .map(|(note, pad)| (*note, pad))
            .collect();
        entries.sort_by_key(|(note, _)| *note);
        entries
    }

    pub fn len(&self) -> usize {
        self.note_to_pad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.note_to_pad.is_empty()
    }
}
