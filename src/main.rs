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
mod audio;
mod catalog;
mod config;
mod controller;
mod notes;
mod pads;
mod range;
mod router;
mod samples;
#[cfg(test)]
mod testutil;
mod trigger;

use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::notes::PitchClass;
use crate::range::InstrumentSelector;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=pulsepad sampler

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/pulsepad
ExecStart=/usr/local/bin/pulsepad start "$PULSEPAD_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=pulsepad.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A velocity-layered sampler for force-sensitive pads."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the note table of an instrument as YAML.
    Catalog {
        /// The path to the pulsepad config.
        config_path: PathBuf,
        /// The instrument (piano or secondary).
        instrument: InstrumentSelector,
    },
    /// Shows which notes the pads would play for a starting note.
    Range {
        /// The path to the pulsepad config.
        config_path: PathBuf,
        /// The instrument selector (piano, secondary or custom).
        instrument: InstrumentSelector,
        /// The note of the first pad, e.g. C#.
        note: PitchClass,
        /// The octave of the first pad.
        #[arg(allow_hyphen_values = true)]
        octave: i32,
    },
    /// Start will start the sampler.
    Start {
        /// The path to the pulsepad config.
        config_path: PathBuf,
        /// Also read commands from the terminal.
        #[arg(short, long)]
        console: bool,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
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
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Catalog {
            config_path,
            instrument,
        } => {
            let instrument = config::load_instrument(&config_path, instrument)?;
            println!("# {} ({} files)", instrument.name(), instrument.table().files().len());
            print!("{}", serde_yml::to_string(instrument.table())?);
        }
        Commands::Range {
            config_path,
            instrument,
            note,
            octave,
        } => {
            let (name, bounds) = config::load_bounds(&config_path, instrument)?;
            let assignment = range::assign(note, octave, bounds);
            for line in assignment.report(&name) {
                println!("{}", line);
            }
            for (pad, note) in assignment.notes().iter().enumerate() {
                println!("- Pad {}: {}", pad + 1, notes::note_name(*note));
            }
        }
        Commands::Start {
            config_path,
            console,
        } => {
            let controller = config::init_controller(&config_path, console)?;
            controller.join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    }

    Ok(())
}
