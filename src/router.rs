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

//! Routes pad triggers to voices and applies user commands.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::{Bus, Volume};
use crate::catalog::{Instrument, SampleRef};
use crate::notes::{self, PitchClass};
use crate::pads::{PadInstrument, Pads};
use crate::range::{self, Bounds, InstrumentSelector, RangeAssignment, PAD_COUNT};
use crate::samples::{VoiceError, VoiceKey, VoiceManager};
use crate::trigger::{Action, Trigger};

/// Name used in reports for the custom mode.
const CUSTOM_NAME: &str = "Custom";

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("pad {0} is outside 1-20")]
    InvalidPad(i64),

    #[error("pad {0} has no note in the current range")]
    Unassigned(usize),

    #[error("pad {0} is disabled")]
    Disabled(usize),

    #[error("pad {0} has no uploaded file")]
    NoUploadedFile(usize),

    #[error("pad {0} has no instrument assigned")]
    NoInstrument(usize),

    #[error("{instrument} has no sample for {note} at velocity {velocity}")]
    NoSample {
        instrument: String,
        note: String,
        velocity: u8,
    },

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// User commands. Pads are 0-indexed.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SelectInstrument(InstrumentSelector),
    SetStartNote(PitchClass, i32),
    SetPadEnabled(usize, bool),
    SetAllPadsEnabled(bool),
    AssignInstrument(usize, PadInstrument),
    SetUploadedFile(usize, Option<PathBuf>),
    SetVolume(Volume, f32),
}

/// Where a pad's voice comes from.
struct Source {
    key: VoiceKey,
    bus: Bus,
    fade: Duration,
}

/// The trigger router. Owns the voice manager, the pad states and the current
/// range assignment.
pub struct Router {
    selector: InstrumentSelector,
    piano: Instrument,
    secondary: Instrument,
    uploaded_fade: Duration,
    custom_bounds: Bounds,
    start: (PitchClass, i32),
    assignment: RangeAssignment,
    pads: Pads,
    voices: VoiceManager,
}

impl Router {
    /// Creates a router in piano mode starting at C4.
    pub fn new(
        piano: Instrument,
        secondary: Instrument,
        uploaded_fade: Duration,
        custom_bounds: Bounds,
        voices: VoiceManager,
    ) -> Router {
        let start = (PitchClass::C, 4);
        let assignment = range::assign(start.0, start.1, piano.table().bounds());
        Router {
            selector: InstrumentSelector::Piano,
            piano,
            secondary,
            uploaded_fade,
            custom_bounds,
            start: assignment.start_note(),
            assignment,
            pads: Pads::new(),
            voices,
        }
    }

    pub fn selector(&self) -> InstrumentSelector {
        self.selector
    }

    pub fn assignment(&self) -> &RangeAssignment {
        &self.assignment
    }

    pub fn pads(&self) -> &Pads {
        &self.pads
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn instrument(&self, selector: InstrumentSelector) -> Option<&Instrument> {
        match selector {
            InstrumentSelector::Piano => Some(&self.piano),
            InstrumentSelector::Secondary => Some(&self.secondary),
            InstrumentSelector::Custom => None,
        }
    }

    /// Decodes every file of both instrument catalogs ahead of time.
    pub fn preload(&mut self) -> usize {
        let files = self
            .piano
            .table()
            .files()
            .into_iter()
            .chain(self.secondary.table().files());
        self.voices.preload(files)
    }

    /// Handles a single trigger from the sensor board.
    pub fn on_trigger(&mut self, trigger: &Trigger) -> Result<(), RouteError> {
        let pad = trigger
            .pad_index()
            .ok_or(RouteError::InvalidPad(trigger.pad()))?;
        let note = self
            .assignment
            .note_for_pad(pad)
            .ok_or(RouteError::Unassigned(pad + 1))?;
        if !self.pads.get(pad).is_some_and(|state| state.enabled()) {
            return Err(RouteError::Disabled(pad + 1));
        }

        debug!(
            pad = pad + 1,
            note = notes::note_name(note),
            velocity = trigger.velocity(),
            action = ?trigger.action(),
            "Pad triggered"
        );

        match trigger.action() {
            Action::Start => {
                let (source, sample) = self.start_target(pad, note, trigger.velocity())?;
                self.voices
                    .start(source.key, &sample, trigger.velocity(), source.bus)?;
            }
            Action::Stop => {
                let source = self.stop_target(pad, note)?;
                self.voices.stop(&source.key, source.fade);
            }
        }
        Ok(())
    }

    /// Applies a user command and returns the lines to report back.
    pub fn apply(&mut self, command: Command) -> Vec<String> {
        let lines = match command {
            Command::SelectInstrument(selector) => {
                self.voices.stop_all();
                self.selector = selector;
                self.reassign()
            }
            Command::SetStartNote(pitch, octave) => {
                self.start = (pitch, octave);
                self.reassign()
            }
            Command::SetPadEnabled(pad, enabled) => self.set_pad_enabled(pad, enabled),
            Command::SetAllPadsEnabled(enabled) => (0..PAD_COUNT)
                .flat_map(|pad| self.set_pad_enabled(pad, enabled))
                .collect(),
            Command::AssignInstrument(pad, instrument) => {
                if pad >= PAD_COUNT {
                    return vec![no_such_pad(pad)];
                }
                self.release_pad(pad);
                self.pads.set_instrument(pad, instrument);
                vec![format!("Pad {} instrument: {}", pad + 1, instrument)]
            }
            Command::SetUploadedFile(pad, file) => {
                if pad >= PAD_COUNT {
                    return vec![no_such_pad(pad)];
                }
                self.release_pad(pad);
                let line = match &file {
                    Some(file) => format!("Pad {} file: {}", pad + 1, file.display()),
                    None => format!("Pad {} file removed", pad + 1),
                };
                self.pads.set_uploaded(pad, file);
                vec![line]
            }
            Command::SetVolume(volume, gain) => {
                self.voices.device().set_volume(volume, gain);
                vec![format!("{} volume: {:.2}", volume, gain)]
            }
        };

        for line in &lines {
            info!("{}", line);
        }
        lines
    }

    /// Tears down finished voices.
    pub fn tick(&mut self, now: Instant) {
        self.voices.tick(now);
    }

    /// Hard-cuts every voice.
    pub fn stop_all(&mut self) {
        self.voices.stop_all();
    }

    fn bounds(&self) -> Bounds {
        match self.selector {
            InstrumentSelector::Piano => self.piano.table().bounds(),
            InstrumentSelector::Secondary => self.secondary.table().bounds(),
            InstrumentSelector::Custom => self.custom_bounds,
        }
    }

    fn reassign(&mut self) -> Vec<String> {
        self.assignment = range::assign(self.start.0, self.start.1, self.bounds());
        self.start = self.assignment.start_note();
        let name = self
            .instrument(self.selector)
            .map(|instrument| instrument.name().to_string())
            .unwrap_or_else(|| CUSTOM_NAME.to_string());
        self.assignment.report(&name)
    }

    fn set_pad_enabled(&mut self, pad: usize, enabled: bool) -> Vec<String> {
        if !enabled {
            self.release_pad(pad);
        }
        match self.pads.set_enabled(pad, enabled) {
            Some(_) => vec![format!(
                "Pad {} {}",
                pad + 1,
                if enabled { "enabled" } else { "disabled" }
            )],
            None => vec![no_such_pad(pad)],
        }
    }

    /// Fades out whatever the pad is currently sounding.
    fn release_pad(&mut self, pad: usize) {
        let Some(note) = self.assignment.note_for_pad(pad) else {
            return;
        };
        if let Ok(source) = self.stop_target(pad, note) {
            self.voices.stop(&source.key, source.fade);
        }
    }

    /// The instrument the pad plays in the current mode.
    fn pad_instrument(&self, pad: usize) -> PadInstrument {
        match self.selector {
            InstrumentSelector::Piano => PadInstrument::Piano,
            InstrumentSelector::Secondary => PadInstrument::Secondary,
            InstrumentSelector::Custom => self
                .pads
                .get(pad)
                .map(|state| state.instrument())
                .unwrap_or(PadInstrument::None),
        }
    }

    fn stop_target(&self, pad: usize, note: u8) -> Result<Source, RouteError> {
        match self.pad_instrument(pad) {
            PadInstrument::Piano => Ok(Source {
                key: VoiceKey::Note(note),
                bus: Bus::Piano,
                fade: self.piano.fade(),
            }),
            PadInstrument::Secondary => Ok(Source {
                key: VoiceKey::Note(note),
                bus: Bus::Secondary,
                fade: self.secondary.fade(),
            }),
            PadInstrument::Uploaded => {
                let file = self
                    .pads
                    .get(pad)
                    .and_then(|state| state.uploaded())
                    .ok_or(RouteError::NoUploadedFile(pad + 1))?;
                Ok(Source {
                    key: VoiceKey::File(file.to_path_buf()),
                    bus: Bus::Uploaded,
                    fade: self.uploaded_fade,
                })
            }
            PadInstrument::None => Err(RouteError::NoInstrument(pad + 1)),
        }
    }

    fn start_target(
        &self,
        pad: usize,
        note: u8,
        velocity: u8,
    ) -> Result<(Source, SampleRef), RouteError> {
        let source = self.stop_target(pad, note)?;
        let instrument = match source.bus {
            Bus::Piano => &self.piano,
            Bus::Secondary => &self.secondary,
            Bus::Uploaded => {
                let sample = match &source.key {
                    VoiceKey::File(path) => SampleRef::unshifted(path.clone()),
                    VoiceKey::Note(_) => return Err(RouteError::NoUploadedFile(pad + 1)),
                };
                return Ok((source, sample));
            }
        };

        let sample = instrument
            .table()
            .resolve(note, velocity)
            .cloned()
            .ok_or_else(|| RouteError::NoSample {
                instrument: instrument.name().to_string(),
                note: notes::note_name(note),
                velocity,
            })?;
        Ok((source, sample))
    }
}

fn no_such_pad(pad: usize) -> String {
    format!("Pad {} does not exist", pad + 1)
}
