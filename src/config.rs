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
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use tracing::info;

use crate::audio;
use crate::catalog;
use crate::controller::{self, Controller};
use crate::range::{Bounds, InstrumentSelector};
use crate::router::{Command, Router};
use crate::samples::VoiceManager;

use self::pulsepad::Pulsepad;

mod error;
mod instrument;
mod pulsepad;

pub use error::ConfigError;

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|reason| ConfigError::Duration {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        })
}

fn load(path: &Path) -> Result<Pulsepad, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?)
}

/// Relative paths in the config are relative to the directory holding it.
fn base_path(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}

/// Builds the router described by the config, with the startup mode, start
/// note, volumes and uploaded files already applied.
fn build_router(
    config: &Pulsepad,
    base_path: &Path,
    device: Arc<dyn audio::Device>,
) -> Result<Router, ConfigError> {
    let uploaded = config.uploaded();
    let mut router = Router::new(
        config.piano(base_path)?,
        config.secondary(base_path)?,
        uploaded.fade()?,
        config.custom_bounds(),
        VoiceManager::new(device, config.base_gain()),
    );

    let (pitch, octave) = config.start();
    let mut commands = vec![
        Command::SelectInstrument(config.mode()),
        Command::SetStartNote(pitch, octave),
    ];
    commands.extend(
        config
            .volumes()
            .into_iter()
            .map(|(volume, gain)| Command::SetVolume(volume, gain)),
    );
    commands.extend(
        uploaded
            .pads(base_path)?
            .into_iter()
            .map(|(pad, file)| Command::SetUploadedFile(pad, Some(file))),
    );
    for command in commands {
        router.apply(command);
    }

    if config.preload() {
        let count = router.preload();
        info!(
            count,
            memory_kb = router.voices().cached_bytes() / 1024,
            "Preloaded samples."
        );
    }
    Ok(router)
}

/// Initializes the router and its drivers from the given config file and
/// returns the running controller. With `console` set, commands are read from
/// the terminal as well.
pub fn init_controller(path: &Path, console: bool) -> Result<Controller, Box<dyn Error>> {
    let config = load(path)?;
    let poll_interval = config.poll_interval()?;

    let serial = controller::serial::Driver::new(config.trigger_source());
    if console && serial.is_stdin() {
        return Err(ConfigError::StdinConflict.into());
    }

    let device = audio::get_device(config.audio_device())?;
    info!(device = %device, "Audio device opened.");
    let router = build_router(&config, base_path(path), device)?;

    let mut drivers: Vec<Arc<dyn controller::Driver>> = vec![Arc::new(serial)];
    if console {
        drivers.push(Arc::new(controller::console::Driver::new()));
    }
    Ok(Controller::new(router, drivers, poll_interval))
}

/// Loads one instrument's catalog. The custom selector has no catalog of its own.
pub fn load_instrument(
    path: &Path,
    selector: InstrumentSelector,
) -> Result<catalog::Instrument, Box<dyn Error>> {
    let config = load(path)?;
    match config.instrument(selector, base_path(path)) {
        Some(instrument) => Ok(instrument?),
        None => Err(format!("{} mode has no catalog of its own", selector).into()),
    }
}

/// Returns the name and note bounds the selector plays with.
pub fn load_bounds(
    path: &Path,
    selector: InstrumentSelector,
) -> Result<(String, Bounds), Box<dyn Error>> {
    let config = load(path)?;
    match config.instrument(selector, base_path(path)) {
        Some(instrument) => {
            let instrument = instrument?;
            Ok((instrument.name().to_string(), instrument.table().bounds()))
        }
        None => Ok(("Custom".to_string(), config.custom_bounds())),
    }
}
