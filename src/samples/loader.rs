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

//! Sample fetching and decoding.
//!
//! Samples are decoded entirely into memory at startup for zero-latency playback.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

/// Errors that can occur while loading a single sample.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("No sound file declared")]
    MissingLocator,

    #[error("Failed to read {path}: {source}")]
    Fetch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("{0} contains no audio")]
    Empty(PathBuf),

    #[error("Load task failed: {0}")]
    Task(String),
}

/// A decoded sample that can be played back any number of times.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone)]
pub struct LoadedSample {
    /// A display name for the sample, usually its file name.
    name: Arc<str>,
    /// The sample data as interleaved f32 samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a new loaded sample from interleaved data.
    pub fn new(name: &str, data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        LoadedSample {
            name: Arc::from(name),
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared interleaved sample data.
    pub fn data(&self) -> &Arc<Vec<f32>> {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("name", &self.name)
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Fetches and decodes a sample. Implementations block, so callers run them on a
/// blocking task.
pub trait SampleLoader: Send + Sync {
    fn load(&self, locator: &Path) -> Result<LoadedSample, LoadError>;
}

/// Loads samples from the local filesystem and decodes them with symphonia.
pub struct FileLoader {
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl FileLoader {
    /// Creates a new file loader.
    pub fn new(target_sample_rate: u32) -> FileLoader {
        FileLoader { target_sample_rate }
    }

    fn fetch(&self, path: &Path) -> Result<Vec<u8>, LoadError> {
        fs::read(path).map_err(|source| LoadError::Fetch {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Decodes the full contents of an audio file into interleaved samples.
    /// Returns the samples, channel count, and sample rate.
    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<(Vec<f32>, u16, u32), LoadError> {
        let decode_error = |source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_error)?;
        let mut format_reader = probed.format;

        let (track_id, codec_params) = match format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        {
            Some(track) => (track.id, track.codec_params.clone()),
            None => return Err(LoadError::NoAudioTrack(path.to_path_buf())),
        };

        let mut decoder = get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(decode_error)?;

        let mut channel_count = codec_params.channels.map(|c| c.count() as u16);
        let mut sample_rate = codec_params.sample_rate;
        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buffer: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(decode_error(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(path = ?path, error = e, "Skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(decode_error(e)),
            };

            let spec = *decoded.spec();
            channel_count = Some(spec.channels.count() as u16);
            sample_rate = Some(spec.rate);

            if sample_buffer
                .as_ref()
                .map_or(true, |buffer| buffer.capacity() < decoded.capacity())
            {
                sample_buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buffer) = sample_buffer.as_mut() {
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
        }

        match (channel_count, sample_rate) {
            (Some(channels), Some(rate)) if channels > 0 && !samples.is_empty() => {
                Ok((samples, channels, rate))
            }
            _ => Err(LoadError::Empty(path.to_path_buf())),
        }
    }
}

impl SampleLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<LoadedSample, LoadError> {
        debug!(path = ?path, "Loading sample into memory");

        let bytes = self.fetch(path)?;
        let (samples, channel_count, source_sample_rate) = self.decode(path, bytes)?;

        // Transcode if sample rate doesn't match
        let (samples, sample_rate) = if source_sample_rate != self.target_sample_rate {
            debug!(
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            (
                transcode_samples(
                    &samples,
                    channel_count,
                    source_sample_rate,
                    self.target_sample_rate,
                ),
                self.target_sample_rate,
            )
        } else {
            (samples, source_sample_rate)
        };

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let loaded = LoadedSample::new(&name, samples, channel_count, sample_rate);

        info!(
            path = ?path,
            channels = channel_count,
            sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        Ok(loaded)
    }
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Linear interpolation is sufficient for drum hits and one-shots.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames =
        (source_frames as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    fn sine(frames: usize, sample_rate: u32) -> Vec<f32> {
        (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_transcode_samples() {
        let source_samples = sine(4410, 44100);
        let result = transcode_samples(&source_samples, 1, 44100, 48000);

        // Should have more samples at higher rate
        assert_eq!(result.len(), 4800);
    }

    #[test]
    fn test_transcode_stereo() {
        // Stereo: L=1.0, R=-1.0 alternating
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = transcode_samples(&source_samples, 2, 44100, 48000);

        // Check that channels are preserved
        assert!(result.len() >= 8);
        assert_eq!(result.len() % 2, 0);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }

    #[test]
    fn test_load_wav() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kick.wav");
        write_wav(path.clone(), vec![sine(4410, 44100)], 44100)?;

        let loaded = FileLoader::new(44100).load(&path)?;
        assert_eq!(loaded.name(), "kick.wav");
        assert_eq!(loaded.channel_count(), 1);
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.frames(), 4410);
        assert_eq!(loaded.duration().as_millis(), 100);
        Ok(())
    }

    #[test]
    fn test_load_wav_transcodes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("snare.wav");
        write_wav(
            path.clone(),
            vec![sine(4410, 44100), sine(4410, 44100)],
            44100,
        )?;

        let loaded = FileLoader::new(48000).load(&path)?;
        assert_eq!(loaded.channel_count(), 2);
        assert_eq!(loaded.sample_rate(), 48000);
        assert_eq!(loaded.frames(), 4800);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = FileLoader::new(44100).load(Path::new("/nonexistent/kick.wav"));
        assert!(matches!(result, Err(LoadError::Fetch { .. })));
    }

    #[test]
    fn test_undecodable_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("garbage.wav");
        fs::write(&path, b"this is not audio")?;

        let result = FileLoader::new(44100).load(&path);
        assert!(matches!(result, Err(LoadError::Decode { .. })));
        Ok(())
    }
}
