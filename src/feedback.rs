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

//! Outward signals for a presentation layer: pad lights and the input status
//! indicator.

use std::collections::HashMap;

use crate::mapping::Pad;

/// Receives pad light changes.
pub trait PadSink: Send + Sync {
    fn activate(&self, pad: &Pad);
    fn deactivate(&self, pad: &Pad);
}

/// Receives the input connection status.
pub trait StatusSink: Send + Sync {
    fn set_connected(&self, connected: bool);

    /// Live input could not be acquired. Manual triggers still work.
    fn input_unavailable(&self, reason: &str);
}

/// Counts the pending deactivations per pad. Every activation schedules its own
/// deactivation and a pad only goes dark when the last one fires, so overlapping
/// strikes can never leave a pad lit or turn it off early.
#[derive(Debug, Default)]
pub struct PadLights {
    pending: HashMap<Pad, usize>,
}

impl PadLights {
    pub fn new() -> PadLights {
        PadLights::default()
    }

    /// Records an activation. Returns true if the pad was dark before.
    pub fn activate(&mut self, pad: &Pad) -> bool {
        let pending = self.pending.entry(pad.clone()).or_insert(0);
        *pending += 1;
        *pending == 1
    }

    /// Records a fired deactivation. Returns true if the pad is now dark.
    pub fn expire(&mut self, pad: &Pad) -> bool {
        match self.pending.get_mut(pad) {
            Some(pending) if *pending > 1 => {
                *pending -= 1;
                false
            }
            Some(_) => {
                self.pending.remove(pad);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, pad: &Pad) -> bool {
        self.pending.contains_key(pad)
    }
}

/// Prints pad lights and status changes to the terminal.
#[derive(Debug, Default)]
pub struct TerminalFeedback {}

impl TerminalFeedback {
    pub fn new() -> TerminalFeedback {
        TerminalFeedback {}
    }
}

impl PadSink for TerminalFeedback {
    fn activate(&self, pad: &Pad) {
        println!("[{}] *", pad);
    }

    fn deactivate(&self, pad: &Pad) {
        println!("[{}] .", pad);
    }
}

impl StatusSink for TerminalFeedback {
    fn set_connected(&self, connected: bool) {
        if connected {
            println!("MIDI: connected");
        } else {
            println!("MIDI: disconnected");
        }
    }

    fn input_unavailable(&self, reason: &str) {
        println!("MIDI input unavailable ({}). Type pad names to trigger them.", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_activation() {
        let mut lights = PadLights::new();
        let pad = Pad::from("pad-1");

        assert!(lights.activate(&pad));
        assert!(lights.is_active(&pad));
        assert!(lights.expire(&pad));
        assert!(!lights.is_active(&pad));
    }

    #[test]
    fn test_overlapping_activations() {
        let mut lights = PadLights::new();
        let pad = Pad::from("pad-1");

        assert!(lights.activate(&pad));
        assert!(!lights.activate(&pad));
        assert!(!lights.activate(&pad));

        // The first two timers firing must not turn the pad off.
        assert!(!lights.expire(&pad));
        assert!(!lights.expire(&pad));
        assert!(lights.is_active(&pad));

        assert!(lights.expire(&pad));
        assert!(!lights.is_active(&pad));
    }

    #[test]
    fn test_stray_expiry() {
        let mut lights = PadLights::new();
        assert!(!lights.expire(&Pad::from("pad-2")));
    }
}
