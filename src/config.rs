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
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use duration_string::DurationString;

mod audio;
mod error;
mod kit;
mod midi;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::kit::Kit;
pub use self::midi::Midi;

/// Environment variables with this prefix override values from the kit file,
/// e.g. PADPLAY_AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "PADPLAY";

/// Loads a kit configuration from a YAML file.
pub fn load_kit(path: &Path) -> Result<Kit, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let base_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Kit::from_config(settings, base_path)
}

/// Parses a human readable duration such as "100ms".
fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(|duration| duration.into())
        .map_err(|e| ConfigError::InvalidDuration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::mapping::{MappingError, Pad};

    const KIT: &str = r#"
audio:
  device: mock-out
midi:
  device: SPD
flash_duration: 150ms
pad_mapping:
  - { note: 36, pad: pad-1 }
  - { note: 38, pad: pad-2 }
  - { note: 47, pad: pad-7 }
sound_files:
  - { pad: pad-1, file: sounds/kick.wav }
  - { pad: pad-2, file: /abs/snare.wav }
  - { pad: pad-7, file: "" }
  - { pad: pad-9, file: sounds/orphan.wav }
"#;

    fn write_kit(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kit.yaml");
        fs::write(&path, contents).expect("write kit");
        (dir, path)
    }

    #[test]
    fn test_load_kit() -> Result<(), ConfigError> {
        let (dir, path) = write_kit(KIT);
        let kit = load_kit(&path)?;

        assert_eq!(kit.audio().device(), "mock-out");
        assert_eq!(kit.midi().device(), Some("SPD"));
        assert_eq!(kit.flash_duration()?, Duration::from_millis(150));
        assert_eq!(kit.base_path(), dir.path());

        let mapping = kit.mapping()?;
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.pad_for_note(38), Some(&Pad::from("pad-2")));

        // pad-9 has no note and is skipped.
        let assets = kit.assets(&mapping)?;
        assert_eq!(assets.len(), 3);
        assert_eq!(assets[0].note(), 36);
        assert_eq!(
            assets[0].locator(),
            Some(dir.path().join("sounds/kick.wav").as_path())
        );
        assert_eq!(assets[1].locator(), Some(Path::new("/abs/snare.wav")));
        assert_eq!(assets[2].note(), 47);
        assert_eq!(assets[2].locator(), None);

        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let (_dir, path) = write_kit("pad_mapping:\n  - { note: 36, pad: pad-1 }\n");
        let kit = load_kit(&path)?;

        assert_eq!(kit.audio().device(), "default");
        assert_eq!(kit.midi().device(), None);
        assert_eq!(kit.flash_duration()?, Duration::from_millis(100));
        assert!(kit.assets(&kit.mapping()?)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_pad_rejected() {
        let (_dir, path) = write_kit(
            "pad_mapping:\n  - { note: 36, pad: pad-1 }\n  - { note: 37, pad: pad-1 }\n",
        );
        let kit = load_kit(&path).expect("kit should parse");
        assert!(matches!(
            kit.mapping(),
            Err(ConfigError::Mapping(MappingError::DuplicatePad { .. }))
        ));
    }

    #[test]
    fn test_duplicate_sound_file_rejected() {
        let (_dir, path) = write_kit(
            "pad_mapping:\n  - { note: 36, pad: pad-1 }\nsound_files:\n  - { pad: pad-1, file: a.wav }\n  - { pad: pad-1, file: b.wav }\n",
        );
        let kit = load_kit(&path).expect("kit should parse");
        let mapping = kit.mapping().expect("mapping should be valid");
        assert!(matches!(
            kit.assets(&mapping),
            Err(ConfigError::DuplicateSoundFile(pad)) if pad == Pad::from("pad-1")
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_kit(Path::new("/nonexistent/kit.yaml")),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_invalid_flash_duration() {
        let (_dir, path) = write_kit("flash_duration: quick\n");
        let kit = load_kit(&path).expect("kit should parse");
        assert!(matches!(
            kit.flash_duration(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }
}
