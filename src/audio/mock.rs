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

use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::samples::LoadedSample;

/// The sample rate a mock device reports when none is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A mock device. Doesn't actually play anything, but remembers what it was asked
/// to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    played: Arc<Mutex<Vec<(String, f32)>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the (sample name, gain) of every one-shot played so far.
    pub fn played(&self) -> Vec<(String, f32)> {
        self.played.lock().clone()
    }
}

impl crate::audio::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play_one_shot(&self, sample: &LoadedSample, gain: f32) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "play one-shot (mock)");
        let _enter = span.enter();

        info!(
            device = self.name,
            sample = sample.name(),
            gain,
            duration_ms = sample.duration().as_millis(),
            "Playing one-shot."
        );
        self.played.lock().push((sample.name().to_string(), gain));
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
