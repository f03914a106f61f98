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

use std::{collections::BTreeSet, error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, span, warn, Level};

use super::{PortEvent, PortState};
use crate::dispatcher::Input;

/// A mock MIDI access. Ports are attached, detached and fed by hand.
#[derive(Clone)]
pub struct Access {
    name: String,
    ports: Arc<Mutex<BTreeSet<String>>>,
    sender: Arc<Mutex<Option<UnboundedSender<Input>>>>,
}

impl Access {
    /// Creates a mock access with no ports attached.
    pub fn new(name: &str) -> Access {
        Access {
            name: name.to_string(),
            ports: Arc::new(Mutex::new(BTreeSet::new())),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Attaches an input port and notifies the watcher.
    pub fn attach(&self, port: &str) {
        self.ports.lock().insert(port.to_string());
        self.forward(Input::DeviceLifecycle(PortEvent::input(
            port,
            PortState::Connected,
        )));
    }

    /// Detaches an input port and notifies the watcher.
    pub fn detach(&self, port: &str) {
        self.ports.lock().remove(port);
        self.forward(Input::DeviceLifecycle(PortEvent::input(
            port,
            PortState::Disconnected,
        )));
    }

    /// Sends raw bytes as if they arrived from an attached port.
    pub fn send(&self, bytes: &[u8]) {
        self.forward(Input::DeviceRaw(bytes.to_vec()));
    }

    fn forward(&self, input: Input) {
        if let Some(sender) = self.sender.lock().as_ref() {
            if sender.send(input).is_err() {
                warn!(device = self.name, "Input lane has closed.");
            }
        }
    }
}

impl super::Access for Access {
    fn input_count(&self) -> usize {
        self.ports.lock().len()
    }

    fn watch(&self, sender: UnboundedSender<Input>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "watch inputs (mock)");
        let _enter = span.enter();

        let mut current = self.sender.lock();
        if current.is_some() {
            return Err("Already watching events.".into());
        }

        info!(device = self.name, "Watching MIDI events.");
        *current = Some(sender);
        Ok(())
    }

    fn stop_watch(&self) {
        self.sender.lock().take();
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Access>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
