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

//! The event dispatcher. Every input the system reacts to (device bytes, manual
//! triggers, sample load completions, hot-plug notifications and feedback timers)
//! is queued onto a single lane and handled in arrival order by one task, which
//! owns the connection status and the pad light state.

use std::sync::Arc;
use std::time::Duration;

use midly::live::LiveEvent;
use midly::MidiMessage;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, span, Instrument, Level};

use crate::connection::{ConnectionMonitor, ConnectionStatus};
use crate::feedback::{PadLights, PadSink, StatusSink};
use crate::mapping::{MappingTable, Pad};
use crate::midi::{self, PortEvent};
use crate::playback::PlaybackTrigger;

/// The velocity used for manual triggers, a full-force hit.
pub const MANUAL_VELOCITY: u8 = 127;

/// Everything that can arrive on the dispatch lane.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// Raw bytes of one message from a MIDI input.
    DeviceRaw(Vec<u8>),
    /// A pad hit from a pointer, touch or keyboard surface.
    ManualTrigger(Pad),
    /// A sample load settled.
    LoadCompleted { note: u8, loaded: bool },
    /// A MIDI port was attached or detached.
    DeviceLifecycle(PortEvent),
    /// A pad light's deactivation timer fired.
    FeedbackExpired(Pad),
}

/// A classified pad hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strike {
    pub note: u8,
    pub velocity: u8,
}

/// What handling a strike did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrikeOutcome {
    /// The pad that lit up, if the note is mapped.
    pub pad: Option<Pad>,
    /// Whether a sample started playing.
    pub played: bool,
}

/// Classifies raw device bytes. Only a Note-On with a non-zero velocity is a
/// strike. A Note-On with zero velocity is a note-off and everything else is
/// ignored.
pub fn classify(bytes: &[u8]) -> Option<Strike> {
    match LiveEvent::parse(bytes) {
        Ok(LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        }) if vel > 0 => Some(Strike {
            note: key.as_int(),
            velocity: vel.as_int(),
        }),
        Ok(event) => {
            debug!(event = ?event, "Ignoring MIDI event");
            None
        }
        Err(e) => {
            debug!(bytes = ?bytes, err = %e, "Unable to parse MIDI bytes");
            None
        }
    }
}

/// Tracks how many configured samples have settled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub expected: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl LoadProgress {
    pub fn pending(&self) -> usize {
        self.expected.saturating_sub(self.loaded + self.failed)
    }

    fn record(&mut self, loaded: bool) {
        if loaded {
            self.loaded += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub struct Dispatcher {
    mapping: Arc<MappingTable>,
    playback: PlaybackTrigger,
    pads: Arc<dyn PadSink>,
    status: Arc<dyn StatusSink>,
    access: Option<Arc<dyn midi::Access>>,
    monitor: ConnectionMonitor,
    lights: PadLights,
    flash_duration: Duration,
    progress: LoadProgress,
    /// Used to post feedback expiries back onto the lane. Weak so that the lane
    /// still closes once every producer is gone.
    lane: WeakUnboundedSender<Input>,
}

impl Dispatcher {
    /// Creates a dispatcher that posts its own timers through the given sender.
    pub fn new(
        mapping: Arc<MappingTable>,
        playback: PlaybackTrigger,
        pads: Arc<dyn PadSink>,
        status: Arc<dyn StatusSink>,
        flash_duration: Duration,
        lane: &UnboundedSender<Input>,
    ) -> Dispatcher {
        Dispatcher {
            mapping,
            playback,
            pads,
            status,
            access: None,
            monitor: ConnectionMonitor::new(0),
            lights: PadLights::new(),
            flash_duration,
            progress: LoadProgress::default(),
            lane: lane.downgrade(),
        }
    }

    /// Attaches granted MIDI access. The connection status starts from the inputs
    /// enumerated right now and is published to the status sink.
    pub fn with_access(mut self, access: Arc<dyn midi::Access>) -> Dispatcher {
        self.monitor = ConnectionMonitor::new(access.input_count());
        self.status.set_connected(self.monitor.status().is_connected());
        self.access = Some(access);
        self
    }

    /// Sets the number of sample loads the lane should expect to hear about.
    pub fn expecting_loads(mut self, expected: usize) -> Dispatcher {
        self.progress.expected = expected;
        self
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    pub fn load_progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn is_pad_active(&self, pad: &Pad) -> bool {
        self.lights.is_active(pad)
    }

    /// Handles inputs in arrival order until every sender has gone away or a
    /// shutdown is signalled.
    pub async fn run(self, inputs: UnboundedReceiver<Input>, shutdown: oneshot::Receiver<()>) {
        let span = span!(Level::INFO, "dispatcher");
        self.process(inputs, shutdown).instrument(span).await
    }

    async fn process(
        mut self,
        mut inputs: UnboundedReceiver<Input>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("Dispatcher started.");
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }
        info!("Dispatcher stopped.");
    }

    /// Handles a single input. Failures are contained here; nothing an input does
    /// can stop the lane.
    pub fn handle(&mut self, input: Input) {
        match input {
            Input::DeviceRaw(bytes) => {
                self.on_device_event(&bytes);
            }
            Input::ManualTrigger(pad) => {
                self.on_manual_trigger(&pad);
            }
            Input::LoadCompleted { note, loaded } => self.on_load_completed(note, loaded),
            Input::DeviceLifecycle(event) => self.on_port_event(&event),
            Input::FeedbackExpired(pad) => {
                if self.lights.expire(&pad) {
                    self.pads.deactivate(&pad);
                }
            }
        }
    }

    /// Classifies raw device bytes and handles the strike, if any.
    pub fn on_device_event(&mut self, bytes: &[u8]) -> Option<StrikeOutcome> {
        classify(bytes).map(|strike| self.strike(strike))
    }

    /// Strikes the note mapped to the pad at full velocity. Unmapped pads are a
    /// no-op.
    pub fn on_manual_trigger(&mut self, pad: &Pad) -> Option<StrikeOutcome> {
        let Some(note) = self.mapping.note_for_pad(pad) else {
            debug!(pad = %pad, "Manual trigger on unmapped pad");
            return None;
        };

        Some(self.strike(Strike {
            note,
            velocity: MANUAL_VELOCITY,
        }))
    }

    /// Lights the mapped pad, if any, and plays whatever is loaded under the note.
    /// Playback does not depend on the mapping.
    pub fn strike(&mut self, strike: Strike) -> StrikeOutcome {
        let pad = self.mapping.pad_for_note(strike.note).cloned();
        match &pad {
            Some(pad) => self.flash(pad),
            None => info!(note = strike.note, "Unmapped note received"),
        }

        let played = self.playback.trigger(strike.note, strike.velocity);
        StrikeOutcome { pad, played }
    }

    fn flash(&mut self, pad: &Pad) {
        self.lights.activate(pad);
        self.pads.activate(pad);

        let Some(lane) = self.lane.upgrade() else {
            // Nothing is left to deliver the expiry, so revert right away.
            if self.lights.expire(pad) {
                self.pads.deactivate(pad);
            }
            return;
        };

        let pad = pad.clone();
        let flash_duration = self.flash_duration;
        tokio::spawn(async move {
            tokio::time::sleep(flash_duration).await;
            let _ = lane.send(Input::FeedbackExpired(pad));
        });
    }

    fn on_load_completed(&mut self, note: u8, loaded: bool) {
        self.progress.record(loaded);
        debug!(
            note,
            loaded,
            pending = self.progress.pending(),
            "Sample load settled"
        );

        if self.progress.expected > 0 && self.progress.pending() == 0 {
            info!(
                loaded = self.progress.loaded,
                failed = self.progress.failed,
                "All samples settled"
            );
        }
    }

    fn on_port_event(&mut self, event: &PortEvent) {
        let enumerated = self
            .access
            .as_ref()
            .map_or(0, |access| access.input_count());
        if let Some(status) = self.monitor.on_port_event(event, enumerated) {
            self.status.set_connected(status.is_connected());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::Path;

    use tokio::sync::mpsc;

    use super::*;
    use crate::audio;
    use crate::midi::PortState;
    use crate::samples::SampleStore;
    use crate::testutil::{eventually_async, FeedbackEvent, RecordingFeedback, StubLoader};

    const FLASH: Duration = Duration::from_millis(20);

    struct Fixture {
        dispatcher: Dispatcher,
        store: Arc<SampleStore>,
        device: Arc<dyn audio::Device>,
        feedback: Arc<RecordingFeedback>,
        sender: UnboundedSender<Input>,
        receiver: UnboundedReceiver<Input>,
    }

    fn fixture() -> Fixture {
        let mapping = MappingTable::new(vec![
            (36, Pad::from("pad-1")),
            (38, Pad::from("pad-2")),
            (47, Pad::from("pad-7")),
        ])
        .expect("valid mapping");
        let store = Arc::new(SampleStore::new(Arc::new(StubLoader::new())));
        let device: Arc<dyn audio::Device> = Arc::new(audio::mock::Device::get("mock", 44100));
        let feedback = Arc::new(RecordingFeedback::new());
        let (sender, receiver) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(
            Arc::new(mapping),
            PlaybackTrigger::new(store.clone(), device.clone()),
            feedback.clone(),
            feedback.clone(),
            FLASH,
            &sender,
        );

        Fixture {
            dispatcher,
            store,
            device,
            feedback,
            sender,
            receiver,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&[0x90, 36, 100]),
            Some(Strike {
                note: 36,
                velocity: 100
            })
        );
        // Any channel.
        assert_eq!(
            classify(&[0x9F, 38, 1]),
            Some(Strike {
                note: 38,
                velocity: 1
            })
        );
        // Velocity zero is a note-off.
        assert_eq!(classify(&[0x90, 36, 0]), None);
        // Note-off, control change, clock and garbage are all ignored.
        assert_eq!(classify(&[0x80, 36, 64]), None);
        assert_eq!(classify(&[0xB0, 7, 100]), None);
        assert_eq!(classify(&[0xF8]), None);
        assert_eq!(classify(&[0x90, 36]), None);
        assert_eq!(classify(&[]), None);
    }

    #[tokio::test]
    async fn test_mapped_strike_plays_and_flashes() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();
        f.store.load(36, Some(Path::new("kick.wav"))).await;

        let outcome = f.dispatcher.on_device_event(&[0x90, 36, 100]);
        assert_eq!(
            outcome,
            Some(StrikeOutcome {
                pad: Some(Pad::from("pad-1")),
                played: true
            })
        );

        let played = f.device.to_mock()?.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].0, "kick.wav");
        assert!((played[0].1 - 100.0 / 127.0).abs() < f32::EPSILON);

        assert_eq!(
            f.feedback.events(),
            vec![FeedbackEvent::Activate(Pad::from("pad-1"))]
        );
        assert!(f.dispatcher.is_pad_active(&Pad::from("pad-1")));

        // The deactivation arrives on the lane after the flash duration.
        let expiry = f.receiver.recv().await;
        assert_eq!(expiry, Some(Input::FeedbackExpired(Pad::from("pad-1"))));
        f.dispatcher.handle(Input::FeedbackExpired(Pad::from("pad-1")));

        assert_eq!(
            f.feedback.events(),
            vec![
                FeedbackEvent::Activate(Pad::from("pad-1")),
                FeedbackEvent::Deactivate(Pad::from("pad-1")),
            ]
        );
        assert!(!f.dispatcher.is_pad_active(&Pad::from("pad-1")));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_locator_is_visual_only() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();
        f.store.load(47, None).await;

        let outcome = f.dispatcher.on_device_event(&[0x90, 47, 127]);
        assert_eq!(
            outcome,
            Some(StrikeOutcome {
                pad: Some(Pad::from("pad-7")),
                played: false
            })
        );
        assert!(f.device.to_mock()?.played().is_empty());
        assert_eq!(
            f.feedback.events(),
            vec![FeedbackEvent::Activate(Pad::from("pad-7"))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unmapped_note_still_plays() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();
        f.store.load(50, Some(Path::new("tom.wav"))).await;

        let outcome = f.dispatcher.on_device_event(&[0x90, 50, 90]);
        assert_eq!(
            outcome,
            Some(StrikeOutcome {
                pad: None,
                played: true
            })
        );
        assert_eq!(f.device.to_mock()?.played().len(), 1);
        assert!(f.feedback.events().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_velocity_is_ignored() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();
        f.store.load(36, Some(Path::new("kick.wav"))).await;

        for note in [36, 38, 50] {
            assert_eq!(f.dispatcher.on_device_event(&[0x90, note, 0]), None);
        }
        assert!(f.device.to_mock()?.played().is_empty());
        assert!(f.feedback.events().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_trigger_without_sample() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();

        let outcome = f.dispatcher.on_manual_trigger(&Pad::from("pad-2"));
        assert_eq!(
            outcome,
            Some(StrikeOutcome {
                pad: Some(Pad::from("pad-2")),
                played: false
            })
        );
        assert_eq!(
            f.feedback.events(),
            vec![FeedbackEvent::Activate(Pad::from("pad-2"))]
        );

        assert_eq!(f.dispatcher.on_manual_trigger(&Pad::from("pad-9")), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_trigger_full_velocity() -> Result<(), Box<dyn Error>> {
        let mut f = fixture();
        f.store.load(38, Some(Path::new("snare.wav"))).await;

        f.dispatcher.handle(Input::ManualTrigger(Pad::from("pad-2")));
        assert_eq!(
            f.device.to_mock()?.played(),
            vec![("snare.wav".to_string(), 1.0)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_overlapping_flashes_revert_once() {
        let mut f = fixture();
        let pad = Pad::from("pad-1");

        f.dispatcher.on_device_event(&[0x90, 36, 100]);
        f.dispatcher.on_device_event(&[0x90, 36, 80]);

        // The first timer fires while the second strike is still lit.
        f.dispatcher.handle(Input::FeedbackExpired(pad.clone()));
        assert!(f.dispatcher.is_pad_active(&pad));
        assert_eq!(
            f.feedback.events(),
            vec![
                FeedbackEvent::Activate(pad.clone()),
                FeedbackEvent::Activate(pad.clone()),
            ]
        );

        f.dispatcher.handle(Input::FeedbackExpired(pad.clone()));
        assert!(!f.dispatcher.is_pad_active(&pad));
        assert_eq!(
            f.feedback.events().last(),
            Some(&FeedbackEvent::Deactivate(pad.clone()))
        );
    }

    #[tokio::test]
    async fn test_connection_status_follows_ports() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let access = midi::request_access(Some("mock"), Duration::from_millis(10))?;
        let mock = access.to_mock()?;
        let mut dispatcher = f.dispatcher.with_access(access);
        assert_eq!(dispatcher.connection_status(), ConnectionStatus::Disconnected);

        mock.attach("A");
        dispatcher.handle(Input::DeviceLifecycle(PortEvent::input(
            "A",
            PortState::Connected,
        )));
        mock.attach("B");
        dispatcher.handle(Input::DeviceLifecycle(PortEvent::input(
            "B",
            PortState::Connected,
        )));
        assert_eq!(dispatcher.connection_status(), ConnectionStatus::Connected);

        mock.detach("A");
        dispatcher.handle(Input::DeviceLifecycle(PortEvent::input(
            "A",
            PortState::Disconnected,
        )));
        assert_eq!(dispatcher.connection_status(), ConnectionStatus::Connected);

        mock.detach("B");
        dispatcher.handle(Input::DeviceLifecycle(PortEvent::input(
            "B",
            PortState::Disconnected,
        )));
        assert_eq!(dispatcher.connection_status(), ConnectionStatus::Disconnected);

        assert_eq!(
            f.feedback.events(),
            vec![
                FeedbackEvent::Connected(false),
                FeedbackEvent::Connected(true),
                FeedbackEvent::Connected(false),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_load_progress() {
        let mut f = fixture();
        f.dispatcher = f.dispatcher.expecting_loads(3);

        f.dispatcher.handle(Input::LoadCompleted {
            note: 36,
            loaded: true,
        });
        f.dispatcher.handle(Input::LoadCompleted {
            note: 38,
            loaded: false,
        });
        assert_eq!(f.dispatcher.load_progress().pending(), 1);

        f.dispatcher.handle(Input::LoadCompleted {
            note: 40,
            loaded: true,
        });
        assert_eq!(
            f.dispatcher.load_progress(),
            LoadProgress {
                expected: 3,
                loaded: 2,
                failed: 1
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lane_processes_in_order() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        f.store.load(36, Some(Path::new("kick.wav"))).await;
        f.store.load(38, Some(Path::new("snare.wav"))).await;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let lane = tokio::spawn(f.dispatcher.run(f.receiver, shutdown_rx));

        f.sender.send(Input::DeviceRaw(vec![0x90, 36, 127]))?;
        f.sender.send(Input::ManualTrigger(Pad::from("pad-2")))?;
        f.sender.send(Input::DeviceRaw(vec![0x99, 36, 0]))?;
        f.sender.send(Input::DeviceRaw(vec![0x90, 36, 64]))?;

        let device = f.device.clone();
        eventually_async(
            move || {
                let device = device.clone();
                async move { device.to_mock().map(|m| m.played().len() == 3).unwrap_or(false) }
            },
            "strikes were never played",
        )
        .await;

        let names: Vec<String> = f
            .device
            .to_mock()?
            .played()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["kick.wav", "snare.wav", "kick.wav"]);

        // Every light goes back off once the timers fire.
        let feedback = f.feedback.clone();
        eventually_async(
            move || {
                let feedback = feedback.clone();
                async move {
                    feedback
                        .events()
                        .iter()
                        .filter(|e| matches!(e, FeedbackEvent::Deactivate(_)))
                        .count()
                        == 2
                }
            },
            "pad lights never reverted",
        )
        .await;

        shutdown_tx.send(()).map_err(|_| "lane already stopped")?;
        lane.await?;
        Ok(())
    }
}
