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

//! A low-latency sample player for MIDI drum pads. Strikes arriving from a MIDI
//! controller, or typed pad names, are resolved to pads and notes, light the pad
//! and play the sample loaded for the note at a velocity-scaled gain.

pub mod audio;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod feedback;
pub mod keyboard;
pub mod mapping;
pub mod midi;
pub mod playback;
pub mod samples;
pub mod session;
#[cfg(test)]
mod testutil;
