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

//! Velocity-scaled one-shot playback of stored samples.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio;
use crate::samples::SampleStore;

/// Maps a MIDI velocity onto a linear gain in (0, 1].
pub fn gain_for_velocity(velocity: u8) -> f32 {
    f32::from(velocity.min(127)) / 127.0
}

/// Starts playback of the sample stored under a note.
pub struct PlaybackTrigger {
    store: Arc<SampleStore>,
    device: Arc<dyn audio::Device>,
}

impl PlaybackTrigger {
    pub fn new(store: Arc<SampleStore>, device: Arc<dyn audio::Device>) -> PlaybackTrigger {
        PlaybackTrigger { store, device }
    }

    /// Plays the sample for the note at a gain of velocity / 127. A note with no
    /// loaded sample is silently skipped. Returns true if a voice was started.
    pub fn trigger(&self, note: u8, velocity: u8) -> bool {
        let Some(sample) = self.store.get(note) else {
            debug!(note, "No sample loaded for note");
            return false;
        };

        let gain = gain_for_velocity(velocity);
        match self.device.play_one_shot(&sample, gain) {
            Ok(()) => {
                debug!(note, velocity, gain, sample = sample.name(), "Triggered sample");
                true
            }
            Err(e) => {
                warn!(note, err = %e, "Unable to play sample");
                false
            }
        }
    }
}
