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

//! Audio output. Devices accept decoded samples and start them immediately as
//! independent one-shot voices.

use std::{any::Any, error::Error, fmt, sync::Arc};

use crate::config;
use crate::samples::LoadedSample;

pub mod cpal;
pub mod mixer;
pub mod mock;

pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// The rate samples must be decoded at to play through this device.
    fn sample_rate(&self) -> u32;

    /// Starts playing the sample right away at the given linear gain. Each call
    /// produces its own voice; nothing already playing is stopped or ducked.
    fn play_one_shot(&self, sample: &LoadedSample, gain: f32) -> Result<(), Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            config.sample_rate().unwrap_or(mock::DEFAULT_SAMPLE_RATE),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
