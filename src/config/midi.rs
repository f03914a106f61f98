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
use std::time::Duration;

use serde::Deserialize;

use super::parse_duration;
use super::ConfigError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Midi {
    /// Only input ports whose name contains this value are used. A value starting
    /// with "mock" selects the mock backend.
    device: Option<String>,

    /// How often the port list is scanned for attached and detached devices.
    poll_interval: Option<String>,
}

impl Midi {
    /// New will create a new MIDI configuration.
    pub fn new(device: Option<&str>, poll_interval: Option<&str>) -> Midi {
        Midi {
            device: device.map(str::to_string),
            poll_interval: poll_interval.map(str::to_string),
        }
    }

    /// Returns the device name filter.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the hot-plug poll interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(poll_interval) => parse_duration(poll_interval),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }
}
