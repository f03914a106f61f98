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

//! Tracks whether any MIDI input is attached.

use std::fmt;

use tracing::{debug, info};

use crate::midi::{PortEvent, PortKind, PortState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionStatus::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Derives the connection status from hot-plug notifications. The monitor only
/// reacts; it never enumerates devices itself, so callers pass in the current
/// input count whenever it is needed.
#[derive(Debug)]
pub struct ConnectionMonitor {
    status: ConnectionStatus,
}

impl ConnectionMonitor {
    /// Creates a monitor from the number of inputs enumerated at startup.
    pub fn new(enumerated_inputs: usize) -> ConnectionMonitor {
        let status = if enumerated_inputs > 0 {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        ConnectionMonitor { status }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Applies a port notification. Returns the new status if it changed.
    ///
    /// An attach always means connected. A detach only means disconnected once
    /// no inputs remain. Output ports are ignored.
    pub fn on_port_event(
        &mut self,
        event: &PortEvent,
        enumerated_inputs: usize,
    ) -> Option<ConnectionStatus> {
        if event.kind != PortKind::Input {
            debug!(port = event.name, "Ignoring output port notification");
            return None;
        }

        let next = match event.state {
            PortState::Connected => ConnectionStatus::Connected,
            PortState::Disconnected if enumerated_inputs == 0 => ConnectionStatus::Disconnected,
            PortState::Disconnected => ConnectionStatus::Connected,
        };

        if next == self.status {
            return None;
        }

        info!(port = event.name, status = %next, "MIDI connection status changed");
        self.status = next;
        Some(next)
    }
}
