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
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::instrument::{Instrument, PIANO, SECONDARY};
use super::{parse_duration, ConfigError};
use crate::audio::{Bus, Volume};
use crate::notes::{PitchClass, MAX_NOTE};
use crate::range::{Bounds, InstrumentSelector, PAD_COUNT};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_UPLOADED_FADE: Duration = Duration::from_secs(2);
const DEFAULT_START_OCTAVE: i32 = 4;
const DEFAULT_BASE_GAIN: f32 = 0.5;
const DEFAULT_VOLUME: f32 = 1.0;

/// Gains for the master output and each instrument bus.
#[derive(Deserialize, Clone, Debug, Default)]
pub(super) struct Volumes {
    master: Option<f32>,
    piano: Option<f32>,
    secondary: Option<f32>,
    uploaded: Option<f32>,
}

impl Volumes {
    /// Every volume stage with its configured gain.
    pub fn gains(&self) -> [(Volume, f32); 4] {
        [
            (Volume::Master, self.master),
            (Volume::Bus(Bus::Piano), self.piano),
            (Volume::Bus(Bus::Secondary), self.secondary),
            (Volume::Bus(Bus::Uploaded), self.uploaded),
        ]
        .map(|(volume, gain)| (volume, gain.unwrap_or(DEFAULT_VOLUME)))
    }
}

/// Files played by pads assigned the uploaded instrument.
#[derive(Deserialize, Clone, Debug, Default)]
pub(super) struct Uploaded {
    /// How long a released file takes to fade out.
    fade: Option<String>,

    /// Initial files, keyed by pad number (1-20).
    pads: Option<BTreeMap<String, String>>,
}

impl Uploaded {
    pub fn fade(&self) -> Result<Duration, ConfigError> {
        match &self.fade {
            Some(fade) => parse_duration("uploaded.fade", fade),
            None => Ok(DEFAULT_UPLOADED_FADE),
        }
    }

    /// The initial files as 0-based pad indices. Relative paths are resolved
    /// against `base_path`.
    pub fn pads(&self, base_path: &Path) -> Result<Vec<(usize, PathBuf)>, ConfigError> {
        self.pads
            .iter()
            .flatten()
            .map(|(pad, file)| {
                let pad = pad
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|pad| (1..=PAD_COUNT).contains(pad))
                    .ok_or_else(|| ConfigError::Pad(pad.clone()))?;
                Ok((pad - 1, base_path.join(file)))
            })
            .collect()
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub(super) struct CustomBounds {
    lower: Option<u8>,
    upper: Option<u8>,
}

/// The configuration for the sampler.
#[derive(Deserialize, Clone, Debug)]
pub(super) struct Pulsepad {
    /// The audio device to use.
    audio_device: String,

    /// The serial device the sensor board writes to, or `-` for stdin.
    trigger_source: String,

    /// How often pending triggers are handled.
    poll_interval: Option<String>,

    /// The instrument selector at startup.
    mode: Option<InstrumentSelector>,

    /// The note of the first pad at startup.
    start_note: Option<PitchClass>,
    start_octave: Option<i32>,

    /// The gain of every voice before the bus and master volumes.
    base_gain: Option<f32>,

    volumes: Option<Volumes>,

    /// Decode every sample at startup. On unless turned off, so the first hit
    /// on a pad doesn't decode on the controller task.
    preload: Option<bool>,

    piano: Option<Instrument>,
    secondary: Option<Instrument>,
    uploaded: Option<Uploaded>,

    /// The note range used in custom mode.
    custom_bounds: Option<CustomBounds>,
}

impl Pulsepad {
    pub fn audio_device(&self) -> &str {
        &self.audio_device
    }

    pub fn trigger_source(&self) -> &Path {
        Path::new(&self.trigger_source)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(poll_interval) => parse_duration("poll_interval", poll_interval),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    pub fn mode(&self) -> InstrumentSelector {
        self.mode.unwrap_or(InstrumentSelector::Piano)
    }

    pub fn start(&self) -> (PitchClass, i32) {
        (
            self.start_note.unwrap_or(PitchClass::C),
            self.start_octave.unwrap_or(DEFAULT_START_OCTAVE),
        )
    }

    pub fn base_gain(&self) -> f32 {
        self.base_gain.unwrap_or(DEFAULT_BASE_GAIN).max(0.0)
    }

    pub fn volumes(&self) -> [(Volume, f32); 4] {
        self.volumes.clone().unwrap_or_default().gains()
    }

    pub fn preload(&self) -> bool {
        self.preload.unwrap_or(true)
    }

    pub fn piano(&self, base_path: &Path) -> Result<crate::catalog::Instrument, ConfigError> {
        self.piano
            .clone()
            .unwrap_or_default()
            .to_instrument(&PIANO, base_path)
    }

    pub fn secondary(&self, base_path: &Path) -> Result<crate::catalog::Instrument, ConfigError> {
        self.secondary
            .clone()
            .unwrap_or_default()
            .to_instrument(&SECONDARY, base_path)
    }

    pub fn uploaded(&self) -> Uploaded {
        self.uploaded.clone().unwrap_or_default()
    }

    pub fn custom_bounds(&self) -> Bounds {
        let bounds = self.custom_bounds.clone().unwrap_or_default();
        Bounds::new(bounds.lower.unwrap_or(0), bounds.upper.unwrap_or(MAX_NOTE))
    }

    /// Looks up the instrument definition by name for the CLI.
    pub fn instrument(
        &self,
        selector: InstrumentSelector,
        base_path: &Path,
    ) -> Option<Result<crate::catalog::Instrument, ConfigError>> {
        match selector {
            InstrumentSelector::Piano => Some(self.piano(base_path)),
            InstrumentSelector::Secondary => Some(self.secondary(base_path)),
            InstrumentSelector::Custom => None,
        }
    }
}
