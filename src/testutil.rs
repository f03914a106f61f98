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

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fs::File,
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use crossbeam_channel::Receiver;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::feedback::{PadSink, StatusSink};
use crate::mapping::Pad;
use crate::samples::{LoadError, LoadedSample, SampleLoader};

/// Wait for the given async predicate to return true or fail.
#[inline]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Writes a 32 bit float WAV file. Each inner vector holds one channel.
pub fn write_wav(
    path: PathBuf,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);

    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Returns a short mono sample with the given name.
pub fn test_sample(name: &str) -> LoadedSample {
    LoadedSample::new(name, vec![0.5; 64], 1, 44100)
}

/// A sample loader that never touches the filesystem. Every locator loads a short
/// test sample named after the locator, unless it has been marked as failing or
/// gated behind a release channel.
#[derive(Default)]
pub struct StubLoader {
    failing: HashSet<PathBuf>,
    gates: HashMap<PathBuf, Receiver<()>>,
}

impl StubLoader {
    pub fn new() -> StubLoader {
        StubLoader::default()
    }

    /// Loads of this locator fail with a fetch error.
    pub fn failing(mut self, locator: &str) -> StubLoader {
        self.failing.insert(PathBuf::from(locator));
        self
    }

    /// Loads of this locator block until a message arrives on the receiver.
    pub fn gated(mut self, locator: &str, release: Receiver<()>) -> StubLoader {
        self.gates.insert(PathBuf::from(locator), release);
        self
    }
}

impl SampleLoader for StubLoader {
    fn load(&self, locator: &Path) -> Result<LoadedSample, LoadError> {
        if let Some(release) = self.gates.get(locator) {
            let _ = release.recv();
        }

        if self.failing.contains(locator) {
            return Err(LoadError::Fetch {
                path: locator.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "stubbed failure"),
            });
        }

        Ok(test_sample(&locator.to_string_lossy()))
    }
}

/// A feedback sink signal, as recorded by [`RecordingFeedback`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedbackEvent {
    Activate(Pad),
    Deactivate(Pad),
    Connected(bool),
    Unavailable(String),
}

/// Records every pad and status signal in order.
#[derive(Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl RecordingFeedback {
    pub fn new() -> RecordingFeedback {
        RecordingFeedback::default()
    }

    pub fn events(&self) -> Vec<FeedbackEvent> {
        self.events.lock().clone()
    }
}

impl PadSink for RecordingFeedback {
    fn activate(&self, pad: &Pad) {
        self.events.lock().push(FeedbackEvent::Activate(pad.clone()));
    }

    fn deactivate(&self, pad: &Pad) {
        self.events.lock().push(FeedbackEvent::Deactivate(pad.clone()));
    }
}

impl StatusSink for RecordingFeedback {
    fn set_connected(&self, connected: bool) {
        self.events.lock().push(FeedbackEvent::Connected(connected));
    }

    fn input_unavailable(&self, reason: &str) {
        self.events
            .lock()
            .push(FeedbackEvent::Unavailable(reason.to_string()));
    }
}
