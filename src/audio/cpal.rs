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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use crate::audio::mixer::{Mixer, Voice};
use crate::audio::Device as AudioDevice;
use crate::config;
use crate::samples::LoadedSample;

/// A small wrapper around a cpal::Device. Used for storing some extra
/// data that makes one-shot playback more convenient.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The rate the output stream runs at.
    sample_rate: u32,
    /// The running output stream. Only present on devices opened with get().
    output: Option<Output>,
}

/// Owns the thread that keeps the cpal stream alive. Dropping it closes the stream.
struct Output {
    /// New voices for the stream callback to pick up.
    voice_tx: Sender<Voice>,
    /// Dropped to signal the output thread to shut down.
    stop_tx: Option<Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Drop for Output {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the stream callback: picks up new voices, mixes, and converts to the
/// device's sample type.
fn create_callback<T>(
    voice_rx: Receiver<Voice>,
    num_channels: u16,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut mixer = Mixer::new(num_channels);
    let mut scratch: Vec<f32> = Vec::new();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        while let Ok(voice) = voice_rx.try_recv() {
            mixer.add(voice);
        }

        scratch.resize(data.len(), 0.0);
        mixer.process_into(&mut scratch);

        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voice_rx: Receiver<Voice>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device.build_output_stream(
        config,
        create_callback::<T>(voice_rx, config.channels),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

impl Output {
    /// Starts the output thread, which creates the stream and holds it until the
    /// output is dropped. Returns once the stream is playing or has failed to start.
    fn start(
        device: cpal::Device,
        sample_format: cpal::SampleFormat,
        config: cpal::StreamConfig,
    ) -> Result<Output, Box<dyn Error>> {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded::<Voice>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let output_thread = thread::spawn(move || {
            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voice_rx),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voice_rx),
                cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, voice_rx),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voice_rx),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {}", other)));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create CPAL stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start CPAL stream: {}", e)));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the sender side goes away.
            let _ = stop_rx.recv();
            drop(stream);
        });

        let output = Output {
            voice_tx,
            stop_tx: Some(stop_tx),
            output_thread: Some(output_thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("CPAL output stream started successfully");
                Ok(output)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("output thread exited before the stream started".into()),
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that have at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    let sample_rate = device
                        .default_output_config()
                        .map(|config| config.sample_rate().0)
                        .unwrap_or(0);

                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate,
                        output: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Opens the configured device and starts its output stream. The name
    /// "default" selects the default host's default output device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device found")?;
            let max_channels = device.default_output_config()?.channels();
            Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
                sample_rate: 0,
                output: None,
            }
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let default_config = device.device.default_output_config()?;
        let sample_rate = config
            .sample_rate()
            .unwrap_or(default_config.sample_rate().0);
        let stream_config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = device.name,
            channels = stream_config.channels,
            sample_rate,
            format = %default_config.sample_format(),
            "Opening audio output"
        );

        device.output = Some(Output::start(
            device.device.clone(),
            default_config.sample_format(),
            stream_config,
        )?);
        device.sample_rate = sample_rate;

        Ok(device)
    }
}

impl AudioDevice for Device {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play_one_shot(&self, sample: &LoadedSample, gain: f32) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::DEBUG, "play one-shot (cpal)");
        let _enter = span.enter();

        let output = self
            .output
            .as_ref()
            .ok_or_else(|| format!("device {} has not been opened for output", self.name))?;
        output.voice_tx.send(Voice::new(sample.clone(), gain))?;
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
