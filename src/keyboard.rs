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
use std::{io, thread};

use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::{info, span, warn, Level};

use crate::dispatcher::Input;
use crate::mapping::Pad;

const QUIT: &str = "quit";

/// Triggers pads by name from the terminal.
pub struct Driver {
    pads: Vec<Pad>,
}

impl Driver {
    /// Creates a driver that offers the given pads in its prompt.
    pub fn new(pads: Vec<Pad>) -> Driver {
        Driver { pads }
    }

    /// Reads one line and forwards it as a manual trigger. Returns false once the
    /// input is exhausted or the user quits.
    fn monitor_io<R, W>(
        &self,
        inputs: &UnboundedSender<Input>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        let pads: Vec<&str> = self.pads.iter().map(Pad::as_str).collect();
        write!(writer, "Pad ({}, {}): ", pads.join(", "), QUIT)?;
        writer.flush()?;

        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match input.trim() {
            "" => Ok(true),
            QUIT => Ok(false),
            pad => {
                if !self.pads.iter().any(|known| known.as_str() == pad) {
                    warn!(input = pad, "Unrecognized pad");
                }
                inputs
                    .send(Input::ManualTrigger(Pad::new(pad)))
                    .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))?;
                Ok(true)
            }
        }
    }

    /// Reads pads from stdin on a dedicated thread. The returned receiver resolves
    /// when stdin closes, the user quits or the lane goes away.
    pub fn monitor_events(
        self,
        inputs: UnboundedSender<Input>,
    ) -> Result<oneshot::Receiver<Result<(), io::Error>>, io::Error> {
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "keyboard driver");
                let _enter = span.enter();

                info!("Keyboard driver started.");

                let result = loop {
                    match self.monitor_io(&inputs, io::stdin().lock(), io::stdout()) {
                        Ok(true) => continue,
                        Ok(false) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                };
                let _ = done_tx.send(result);
            })?;

        Ok(done_rx)
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use super::*;

    fn driver() -> Driver {
        Driver::new(vec![Pad::from("pad-1"), Pad::from("pad-2")])
    }

    fn get_input(line: &str) -> Result<(bool, Option<Input>, String), io::Error> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Input>();

        let reader = BufReader::new(line.as_bytes());
        let mut writer: Vec<u8> = Vec::new();
        let keep_going = driver().monitor_io(&sender, reader, &mut writer)?;

        // Force the sender to close.
        drop(sender);
        let prompt = String::from_utf8_lossy(&writer).to_string();
        Ok((keep_going, receiver.blocking_recv(), prompt))
    }

    #[test]
    fn test_keyboard_inputs() -> Result<(), io::Error> {
        let (keep_going, input, prompt) = get_input("pad-1\n")?;
        assert!(keep_going);
        assert_eq!(input, Some(Input::ManualTrigger(Pad::from("pad-1"))));
        assert_eq!(prompt, "Pad (pad-1, pad-2, quit): ");

        // Unknown pads are still forwarded, the lane decides what to do with them.
        let (_, input, _) = get_input("  pad-9 \n")?;
        assert_eq!(input, Some(Input::ManualTrigger(Pad::from("pad-9"))));

        let (keep_going, input, _) = get_input("\n")?;
        assert!(keep_going);
        assert_eq!(input, None);

        let (keep_going, input, _) = get_input("quit\n")?;
        assert!(!keep_going);
        assert_eq!(input, None);

        let (keep_going, input, _) = get_input("")?;
        assert!(!keep_going);
        assert_eq!(input, None);
        Ok(())
    }

    #[test]
    fn test_closed_lane() {
        let (sender, receiver) = mpsc::unbounded_channel::<Input>();
        drop(receiver);

        let result = driver().monitor_io(&sender, BufReader::new("pad-1\n".as_bytes()), io::sink());
        assert!(result.is_err());
    }
}
