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

//! Decoded sample storage for pad playback.
//!
//! This module provides:
//! - Sample fetching and decoding (in-memory for zero-latency playback)
//! - A note-keyed store that loads every configured asset concurrently

use std::path::{Path, PathBuf};

mod loader;
mod store;

pub use loader::{FileLoader, LoadError, LoadedSample, SampleLoader};
pub use store::{LoadState, SampleStore};

/// A sound declared in configuration: the note it is keyed by and the file that
/// holds it. A missing locator means the pad intentionally has no sound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundAsset {
    note: u8,
    locator: Option<PathBuf>,
}

impl SoundAsset {
    /// Creates a new sound asset.
    pub fn new(note: u8, locator: Option<PathBuf>) -> SoundAsset {
        SoundAsset { note, locator }
    }

    /// Returns the note the asset is stored under.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Returns the file the asset is loaded from, if any.
    pub fn locator(&self) -> Option<&Path> {
        self.locator.as_deref()
    }
}
