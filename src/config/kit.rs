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
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::{parse_duration, Audio, ConfigError, Midi};
use crate::mapping::{MappingTable, Pad};
use crate::samples::SoundAsset;

const DEFAULT_FLASH_DURATION: Duration = Duration::from_millis(100);

/// Associates a MIDI note with a pad.
#[derive(Deserialize, Clone, Debug)]
pub struct PadMapping {
    /// The MIDI note number the pad sends.
    note: u8,
    /// The pad identifier.
    pad: String,
}

/// Associates a pad with the audio file it plays. An empty or missing file means
/// the pad intentionally has no sound.
#[derive(Deserialize, Clone, Debug)]
pub struct SoundFile {
    pad: String,
    #[serde(default)]
    file: Option<String>,
}

/// The configuration for a pad kit.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Kit {
    /// The audio output configuration.
    audio: Option<Audio>,
    /// The MIDI input configuration.
    midi: Option<Midi>,
    /// How long a pad stays lit after a strike.
    flash_duration: Option<String>,
    /// The note to pad mapping.
    #[serde(default)]
    pad_mapping: Vec<PadMapping>,
    /// The pad to audio file mapping.
    #[serde(default)]
    sound_files: Vec<SoundFile>,
    /// Directory that relative sound file paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Kit {
    /// Deserializes a kit from an assembled configuration.
    pub(super) fn from_config(
        settings: config::Config,
        base_path: PathBuf,
    ) -> Result<Kit, ConfigError> {
        let mut kit: Kit = settings.try_deserialize()?;
        kit.base_path = base_path;
        Ok(kit)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Returns the MIDI configuration.
    pub fn midi(&self) -> Midi {
        self.midi.clone().unwrap_or_default()
    }

    /// Returns how long a pad stays lit after a strike.
    pub fn flash_duration(&self) -> Result<Duration, ConfigError> {
        match &self.flash_duration {
            Some(flash_duration) => parse_duration(flash_duration),
            None => Ok(DEFAULT_FLASH_DURATION),
        }
    }

    /// Returns the directory relative sound files are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Builds the note <-> pad mapping table.
    pub fn mapping(&self) -> Result<MappingTable, ConfigError> {
        Ok(MappingTable::new(
            self.pad_mapping
                .iter()
                .map(|mapping| (mapping.note, Pad::new(mapping.pad.as_str()))),
        )?)
    }

    /// Joins the sound files with the mapping table to produce the assets to load.
    /// Sound files for pads without a note are skipped with a warning.
    pub fn assets(&self, mapping: &MappingTable) -> Result<Vec<SoundAsset>, ConfigError> {
        let mut seen: HashSet<Pad> = HashSet::new();
        let mut assets = Vec::with_capacity(self.sound_files.len());

        for sound_file in &self.sound_files {
            let pad = Pad::new(sound_file.pad.as_str());
            if !seen.insert(pad.clone()) {
                return Err(ConfigError::DuplicateSoundFile(pad));
            }

            let note = match mapping.note_for_pad(&pad) {
                Some(note) => note,
                None => {
                    warn!(pad = %pad, "Pad is not mapped to a MIDI note, skipping sound file.");
                    continue;
                }
            };

            let locator = sound_file
                .file
                .as_deref()
                .filter(|file| !file.trim().is_empty())
                .map(|file| self.resolve(file));

            assets.push(SoundAsset::new(note, locator));
        }

        Ok(assets)
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
