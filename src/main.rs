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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use padplay::config;
use padplay::feedback::TerminalFeedback;
use padplay::keyboard;
use padplay::samples::LoadState;
use padplay::session::{self, Session};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample player for MIDI drum pads."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start plays samples for pad strikes until interrupted.
    Start {
        /// The path to the kit config.
        kit_path: PathBuf,
    },
    /// Verify validates the kit config and loads every sample it declares.
    Verify {
        /// The path to the kit config.
        kit_path: PathBuf,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { kit_path } => {
            let kit = config::load_kit(&kit_path)?;
            let feedback = Arc::new(TerminalFeedback::new());
            let session = Session::start(&kit, feedback.clone(), feedback)?;

            let pads = session
                .mapping()
                .entries()
                .into_iter()
                .map(|(_, pad)| pad.clone())
                .collect();
            let keyboard = keyboard::Driver::new(pads).monitor_events(session.sender())?;

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Interrupted.");
                }
                result = keyboard => {
                    if let Ok(Err(e)) = result {
                        error!(err = %e, "Keyboard input failed");
                    }
                }
            }

            session.shutdown().await?;
        }
        Commands::Verify { kit_path } => {
            let kit = config::load_kit(&kit_path)?;
            let reports = session::verify_kit(&kit).await?;

            if reports.is_empty() {
                println!("No sound files declared.");
                return Ok(());
            }

            let mut failures = 0;
            println!("Sound files (count: {}):", reports.len());
            for report in reports {
                let pad = report
                    .pad
                    .as_ref()
                    .map(|pad| pad.to_string())
                    .unwrap_or_else(|| "(unmapped)".to_string());
                let status = match &report.state {
                    Some(LoadState::Loaded(sample)) => format!(
                        "ok ({} ch, {} Hz, {} ms)",
                        sample.channel_count(),
                        sample.sample_rate(),
                        sample.duration().as_millis()
                    ),
                    Some(LoadState::Failed(reason)) => {
                        failures += 1;
                        format!("FAILED: {}", reason)
                    }
                    None => "no sound".to_string(),
                };
                let file = report
                    .locator
                    .as_ref()
                    .map(|locator| locator.display().to_string())
                    .unwrap_or_default();
                println!("- {} (note {}) {} {}", pad, report.note, file, status);
            }

            if failures > 0 {
                return Err(format!("{} sound file(s) failed to load", failures).into());
            }
        }
        Commands::Devices {} => {
            let devices = padplay::audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = padplay::midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {} (Input)", device);
            }
        }
    };

    Ok(())
}
