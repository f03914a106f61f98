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

// One-shot voice mixing that is independent of any audio backend.
use crate::samples::LoadedSample;

/// A single playing instance of a sample.
pub struct Voice {
    sample: LoadedSample,
    gain: f32,
    /// The next frame of the sample to be mixed.
    position: usize,
}

impl Voice {
    /// Creates a voice that starts at the first frame of the sample.
    pub fn new(sample: LoadedSample, gain: f32) -> Voice {
        Voice {
            sample,
            gain,
            position: 0,
        }
    }

    /// Returns true once every frame of the sample has been mixed.
    pub fn is_finished(&self) -> bool {
        self.position >= self.sample.frames()
    }
}

/// Sums every active voice into interleaved output buffers. Voices are dropped
/// once they finish; there is no voice limit.
pub struct Mixer {
    num_channels: u16,
    voices: Vec<Voice>,
}

impl Mixer {
    /// Creates a new mixer for the given number of output channels.
    pub fn new(num_channels: u16) -> Mixer {
        Mixer {
            num_channels: num_channels.max(1),
            voices: Vec::new(),
        }
    }

    /// Adds a voice. It is heard from the next processed buffer onwards.
    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Returns the number of voices still playing.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Mixes the next block of audio into the interleaved output buffer. The
    /// buffer is overwritten, so any shortfall is silence.
    ///
    /// Mono samples are sent to every output channel. Multichannel samples map
    /// channel to channel; sample channels beyond the output's fold back onto the
    /// output channels in order.
    pub fn process_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);

        let out_channels = self.num_channels as usize;
        let frames = output.len() / out_channels;

        for voice in self.voices.iter_mut() {
            let data = voice.sample.data();
            let sample_channels = voice.sample.channel_count() as usize;
            let available = voice.sample.frames().saturating_sub(voice.position);
            let to_mix = frames.min(available);

            for frame in 0..to_mix {
                let source = &data[(voice.position + frame) * sample_channels..][..sample_channels];
                let target = &mut output[frame * out_channels..][..out_channels];

                if sample_channels == 1 {
                    let value = source[0] * voice.gain;
                    target.iter_mut().for_each(|out| *out += value);
                } else {
                    for (channel, value) in source.iter().enumerate() {
                        target[channel % out_channels] += value * voice.gain;
                    }
                }
            }

            voice.position += to_mix;
        }

        self.voices.retain(|voice| !voice.is_finished());
    }
}
