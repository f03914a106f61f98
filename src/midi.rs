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

//! MIDI input access. A backend enumerates input ports, forwards the raw bytes
//! of every message they produce and reports ports as they come and go.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedSender;

use crate::dispatcher::Input;

mod midir;
mod mock;

/// The direction of a MIDI port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

/// Whether a port has just appeared or disappeared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortState {
    Connected,
    Disconnected,
}

/// A hot-plug notification for a single port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortEvent {
    pub name: String,
    pub kind: PortKind,
    pub state: PortState,
}

impl PortEvent {
    pub fn input(name: &str, state: PortState) -> PortEvent {
        PortEvent {
            name: name.to_string(),
            kind: PortKind::Input,
            state,
        }
    }
}

/// Live MIDI input could not be acquired at all.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("MIDI access was denied: {0}")]
    Denied(String),

    #[error("MIDI input is not supported on this system: {0}")]
    Unsupported(String),
}

/// A granted handle to the system's MIDI inputs.
pub trait Access: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the number of input ports currently enumerated.
    fn input_count(&self) -> usize;

    /// Starts forwarding raw input bytes and port notifications to the sender.
    fn watch(&self, sender: UnboundedSender<Input>) -> Result<(), Box<dyn Error>>;

    /// Stops watching and closes every open input connection.
    fn stop_watch(&self);

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Access>, Box<dyn Error>>;
}

/// Requests access to MIDI input. Only ports whose names contain the filter are
/// used. A filter starting with "mock" selects the mock backend, and
/// "mock-denied" simulates a refused request.
pub fn request_access(
    filter: Option<&str>,
    poll_interval: Duration,
) -> Result<Arc<dyn Access>, AccessError> {
    if let Some(name) = filter.filter(|name| name.starts_with("mock")) {
        if name == "mock-denied" {
            return Err(AccessError::Denied(format!("{} refused access", name)));
        }
        return Ok(Arc::new(mock::Access::new(name)));
    }

    Ok(Arc::new(midir::Access::new(filter, poll_interval)?))
}

/// Lists the MIDI input ports known to midir.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    midir::list()
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Access;
}
