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
    fmt,
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};
use midir::{MidiInput, MidiInputConnection};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, span, warn, Level};

use super::Access as _;
use super::{AccessError, PortEvent, PortState};
use crate::dispatcher::Input;

const CLIENT_NAME: &str = "padplay";

/// MIDI input access through midir. midir has no hot-plug notifications, so a
/// watcher thread rescans the port list every poll interval and reports the
/// difference.
pub struct Access {
    /// Only ports whose names contain this value are used.
    filter: Option<String>,
    poll_interval: Duration,
    /// Names of the input ports seen by the most recent scan.
    ports: Arc<Mutex<HashSet<String>>>,
    watcher: Mutex<Option<Watcher>>,
}

struct Watcher {
    /// Dropped to stop the watcher thread.
    stop_tx: Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl Access {
    /// Requests access to the system's MIDI inputs and takes an initial inventory
    /// of the ports.
    pub fn new(filter: Option<&str>, poll_interval: Duration) -> Result<Access, AccessError> {
        let input = MidiInput::new(&format!("{} port scanner", CLIENT_NAME))
            .map_err(|e| AccessError::Unsupported(e.to_string()))?;
        let filter = filter.map(str::to_string);
        let ports = scan(&input, filter.as_deref());

        info!(
            inputs = ports.len(),
            filter = filter.as_deref().unwrap_or("(any)"),
            "MIDI access granted"
        );

        Ok(Access {
            filter,
            poll_interval,
            ports: Arc::new(Mutex::new(ports.into_keys().collect())),
            watcher: Mutex::new(None),
        })
    }
}

/// Returns the matching input ports by name.
fn scan(input: &MidiInput, filter: Option<&str>) -> HashMap<String, midir::MidiInputPort> {
    input
        .ports()
        .into_iter()
        .filter_map(|port| match input.port_name(&port) {
            Ok(name) => Some((name, port)),
            Err(e) => {
                debug!(err = %e, "Unable to read MIDI port name");
                None
            }
        })
        .filter(|(name, _)| filter.map_or(true, |filter| name.contains(filter)))
        .collect()
}

/// Opens an input connection that forwards every message to the lane.
fn connect(
    port: &midir::MidiInputPort,
    name: &str,
    sender: UnboundedSender<Input>,
) -> Result<MidiInputConnection<()>, Box<dyn Error>> {
    let input = MidiInput::new(&format!("{} input", CLIENT_NAME))?;
    let port_name = name.to_string();
    let connection = input
        .connect(
            port,
            &format!("{} pad input", CLIENT_NAME),
            move |_, raw_event, _| {
                if let Ok(event) = LiveEvent::parse(raw_event) {
                    debug!(port = port_name, event = ?event, "Received MIDI event.");
                }
                if let Err(e) = sender.send(Input::DeviceRaw(raw_event.to_vec())) {
                    error!(err = ?e, "Error sending MIDI event to receiver.");
                }
            },
            (),
        )
        .map_err(|e| e.to_string())?;
    Ok(connection)
}

fn watch_ports(
    filter: Option<String>,
    poll_interval: Duration,
    ports: Arc<Mutex<HashSet<String>>>,
    sender: UnboundedSender<Input>,
    stop_rx: crossbeam_channel::Receiver<()>,
) {
    let span = span!(Level::INFO, "watch inputs (midir)");
    let _enter = span.enter();

    let scanner = match MidiInput::new(&format!("{} port scanner", CLIENT_NAME)) {
        Ok(scanner) => scanner,
        Err(e) => {
            error!(err = %e, "Unable to create MIDI port scanner");
            return;
        }
    };
    let mut connections: HashMap<String, MidiInputConnection<()>> = HashMap::new();

    loop {
        let found = scan(&scanner, filter.as_deref());

        let detached: Vec<String> = connections
            .keys()
            .filter(|name| !found.contains_key(*name))
            .cloned()
            .collect();
        let attached: Vec<(&String, &midir::MidiInputPort)> = found
            .iter()
            .filter(|(name, _)| !connections.contains_key(*name))
            .collect();

        // The inventory is updated before any notification goes out so that a
        // detach is always evaluated against the current count.
        *ports.lock() = found.keys().cloned().collect();

        for name in detached {
            connections.remove(&name);
            info!(port = name, "MIDI input detached");
            let _ = sender.send(Input::DeviceLifecycle(PortEvent::input(
                &name,
                PortState::Disconnected,
            )));
        }

        for (name, port) in attached {
            match connect(port, name, sender.clone()) {
                Ok(connection) => {
                    info!(port = name, "MIDI input attached");
                    connections.insert(name.clone(), connection);
                    let _ = sender.send(Input::DeviceLifecycle(PortEvent::input(
                        name,
                        PortState::Connected,
                    )));
                }
                Err(e) => warn!(port = name, err = %e, "Unable to open MIDI input"),
            }
        }

        match stop_rx.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Stopped watching MIDI inputs.");
}

impl super::Access for Access {
    fn input_count(&self) -> usize {
        self.ports.lock().len()
    }

    fn watch(&self, sender: UnboundedSender<Input>) -> Result<(), Box<dyn Error>> {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return Err("Already watching events.".into());
        }

        info!("Watching MIDI events.");

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let filter = self.filter.clone();
        let poll_interval = self.poll_interval;
        let ports = self.ports.clone();
        let thread = thread::Builder::new()
            .name("midi-watcher".to_string())
            .spawn(move || watch_ports(filter, poll_interval, ports, sender, stop_rx))?;

        *watcher = Some(Watcher { stop_tx, thread });
        Ok(())
    }

    fn stop_watch(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            drop(watcher.stop_tx);
            if watcher.thread.join().is_err() {
                error!("MIDI watcher thread panicked");
            }
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Access>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Inputs={})",
            self.filter.as_deref().unwrap_or("all MIDI inputs"),
            self.input_count()
        )
    }
}

/// Lists midir input ports.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new(&format!("{} input listing", CLIENT_NAME))?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}
