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

//! Wires a kit configuration into a running session: sample loading, audio
//! output, MIDI access and the dispatch lane.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::audio;
use crate::config::Kit;
use crate::dispatcher::{Dispatcher, Input};
use crate::feedback::{PadSink, StatusSink};
use crate::mapping::{MappingTable, Pad};
use crate::midi;
use crate::playback::PlaybackTrigger;
use crate::samples::{FileLoader, LoadState, SampleStore};

/// The sample rate used to decode samples when no audio device is opened.
const VERIFY_SAMPLE_RATE: u32 = 44100;

/// A running pad session.
pub struct Session {
    mapping: Arc<MappingTable>,
    store: Arc<SampleStore>,
    device: Arc<dyn audio::Device>,
    access: Option<Arc<dyn midi::Access>>,
    sender: mpsc::UnboundedSender<Input>,
    shutdown: Option<oneshot::Sender<()>>,
    lane: JoinHandle<()>,
    loads: JoinHandle<()>,
}

impl Session {
    /// Starts a session. Must be called from within a tokio runtime.
    ///
    /// Sample loads are started in the background and never waited on; pads
    /// simply stay silent until their sample arrives. If MIDI access cannot be
    /// acquired the status sink is told so and the session carries on with
    /// manual triggers only.
    pub fn start(
        kit: &Kit,
        pads: Arc<dyn PadSink>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Session, Box<dyn Error>> {
        let mapping = Arc::new(kit.mapping()?);
        let assets = kit.assets(&mapping)?;
        let flash_duration = kit.flash_duration()?;
        let midi_config = kit.midi();
        let poll_interval = midi_config.poll_interval()?;

        let device = audio::get_device(&kit.audio())?;
        info!(device = %device, sample_rate = device.sample_rate(), "Audio output ready");

        let store = Arc::new(SampleStore::new(Arc::new(FileLoader::new(
            device.sample_rate(),
        ))));

        let (sender, receiver) = mpsc::unbounded_channel::<Input>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let mut dispatcher = Dispatcher::new(
            mapping.clone(),
            PlaybackTrigger::new(store.clone(), device.clone()),
            pads,
            status.clone(),
            flash_duration,
            &sender,
        )
        .expecting_loads(
            assets
                .iter()
                .filter(|asset| asset.locator().is_some())
                .count(),
        );

        let access = match midi::request_access(midi_config.device(), poll_interval) {
            Ok(access) => match access.watch(sender.clone()) {
                Ok(()) => {
                    info!(access = %access, "Watching MIDI input");
                    dispatcher = dispatcher.with_access(access.clone());
                    Some(access)
                }
                Err(e) => {
                    error!(err = %e, "Unable to watch MIDI input");
                    status.input_unavailable(&e.to_string());
                    None
                }
            },
            Err(e) => {
                error!(err = %e, "MIDI access failed, live input is unavailable");
                status.input_unavailable(&e.to_string());
                None
            }
        };

        let lane = tokio::spawn(dispatcher.run(receiver, shutdown_rx));

        let mut pending = store.load_all(&assets);
        let load_sender = sender.clone();
        let loads = tokio::spawn(async move {
            while let Some(result) = pending.join_next().await {
                match result {
                    Ok((note, loaded)) => {
                        if load_sender
                            .send(Input::LoadCompleted { note, loaded })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => warn!(err = %e, "Sample load task failed"),
                }
            }
        });

        Ok(Session {
            mapping,
            store,
            device,
            access,
            sender,
            shutdown: Some(shutdown_tx),
            lane,
            loads,
        })
    }

    /// Returns a sender onto the dispatch lane.
    pub fn sender(&self) -> mpsc::UnboundedSender<Input> {
        self.sender.clone()
    }

    /// Queues a manual trigger for the pad.
    pub fn trigger(&self, pad: Pad) -> Result<(), Box<dyn Error>> {
        self.sender.send(Input::ManualTrigger(pad))?;
        Ok(())
    }

    pub fn mapping(&self) -> &Arc<MappingTable> {
        &self.mapping
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn device(&self) -> &Arc<dyn audio::Device> {
        &self.device
    }

    /// Returns the MIDI access, if it was granted.
    pub fn access(&self) -> Option<&Arc<dyn midi::Access>> {
        self.access.as_ref()
    }

    /// Stops MIDI input and the dispatch lane.
    pub async fn shutdown(mut self) -> Result<(), Box<dyn Error>> {
        if let Some(access) = &self.access {
            access.stop_watch();
        }
        self.loads.abort();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.lane.await?;
        info!("Session stopped.");
        Ok(())
    }
}

/// The load result for a single configured sound file.
#[derive(Debug)]
pub struct AssetReport {
    pub note: u8,
    pub pad: Option<Pad>,
    pub locator: Option<PathBuf>,
    pub state: Option<LoadState>,
}

/// Loads every sample the kit declares and waits for all of them, without opening
/// any devices.
pub async fn verify_kit(kit: &Kit) -> Result<Vec<AssetReport>, Box<dyn Error>> {
    let mapping = kit.mapping()?;
    let assets = kit.assets(&mapping)?;
    kit.flash_duration()?;
    kit.midi().poll_interval()?;

    let sample_rate = kit.audio().sample_rate().unwrap_or(VERIFY_SAMPLE_RATE);
    let store = Arc::new(SampleStore::new(Arc::new(FileLoader::new(sample_rate))));

    let mut loads = store.load_all(&assets);
    while let Some(result) = loads.join_next().await {
        result?;
    }

    Ok(assets
        .iter()
        .map(|asset| AssetReport {
            note: asset.note(),
            pad: mapping.pad_for_note(asset.note()).cloned(),
            locator: asset.locator().map(PathBuf::from),
            state: store.state(asset.note()),
        })
        .collect())
}
