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
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::range::PAD_COUNT;

/// The instrument a pad plays in custom mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadInstrument {
    #[default]
    Piano,
    Secondary,
    /// The file uploaded for this pad.
    Uploaded,
    /// The pad is silent.
    None,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown pad instrument '{0}', expected piano, secondary, uploaded or none")]
pub struct ParsePadInstrumentError(String);

impl FromStr for PadInstrument {
    type Err = ParsePadInstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piano" => Ok(PadInstrument::Piano),
            "secondary" => Ok(PadInstrument::Secondary),
            "uploaded" => Ok(PadInstrument::Uploaded),
            "none" => Ok(PadInstrument::None),
            _ => Err(ParsePadInstrumentError(s.to_string())),
        }
    }
}

impl fmt::Display for PadInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadInstrument::Piano => write!(f, "piano"),
            PadInstrument::Secondary => write!(f, "secondary"),
            PadInstrument::Uploaded => write!(f, "uploaded"),
            PadInstrument::None => write!(f, "none"),
        }
    }
}

/// The user-controlled state of a single pad.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PadState {
    enabled: bool,
    instrument: PadInstrument,
    uploaded: Option<PathBuf>,
}

impl Default for PadState {
    fn default() -> Self {
        PadState {
            enabled: true,
            instrument: PadInstrument::default(),
            uploaded: None,
        }
    }
}

impl PadState {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn instrument(&self) -> PadInstrument {
        self.instrument
    }

    /// The uploaded file for this pad. Only played when the instrument is `Uploaded`.
    pub fn uploaded(&self) -> Option<&Path> {
        self.uploaded.as_deref()
    }
}

/// The state of every pad, indexed from 0.
#[derive(Clone, Debug)]
pub struct Pads {
    pads: Vec<PadState>,
}

impl Default for Pads {
    fn default() -> Self {
        Pads {
            pads: vec![PadState::default(); PAD_COUNT],
        }
    }
}

impl Pads {
    pub fn new() -> Pads {
        Pads::default()
    }

    pub fn get(&self, pad: usize) -> Option<&PadState> {
        self.pads.get(pad)
    }

    /// Enables or disables a pad. Returns the previous value, or None if the pad doesn't exist.
    pub fn set_enabled(&mut self, pad: usize, enabled: bool) -> Option<bool> {
        self.pads
            .get_mut(pad)
            .map(|state| std::mem::replace(&mut state.enabled, enabled))
    }

    /// Assigns an instrument to a pad. Returns the previous instrument.
    pub fn set_instrument(&mut self, pad: usize, instrument: PadInstrument) -> Option<PadInstrument> {
        self.pads
            .get_mut(pad)
            .map(|state| std::mem::replace(&mut state.instrument, instrument))
    }

    /// Sets or clears the uploaded file for a pad. Returns the previous file.
    pub fn set_uploaded(&mut self, pad: usize, file: Option<PathBuf>) -> Option<Option<PathBuf>> {
        self.pads
            .get_mut(pad)
            .map(|state| std::mem::replace(&mut state.uploaded, file))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PadState> {
        self.pads.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pads = Pads::new();
        assert_eq!(pads.iter().count(), PAD_COUNT);
        assert!(pads.iter().all(|pad| pad.enabled()));
        assert!(pads
            .iter()
            .all(|pad| pad.instrument() == PadInstrument::Piano && pad.uploaded().is_none()));
        assert!(pads.get(PAD_COUNT).is_none());
    }

    #[test]
    fn test_updates() {
        let mut pads = Pads::new();
        assert_eq!(pads.set_enabled(3, false), Some(true));
        assert_eq!(pads.set_enabled(3, false), Some(false));
        assert!(!pads.get(3).unwrap().enabled());
        assert_eq!(pads.set_enabled(20, false), None);

        assert_eq!(
            pads.set_instrument(5, PadInstrument::Uploaded),
            Some(PadInstrument::Piano)
        );
        assert_eq!(
            pads.set_uploaded(5, Some(PathBuf::from("kick.wav"))),
            Some(None)
        );
        assert_eq!(pads.get(5).unwrap().uploaded(), Some(Path::new("kick.wav")));
        assert_eq!(
            pads.set_uploaded(5, None),
            Some(Some(PathBuf::from("kick.wav")))
        );
    }

    #[test]
    fn test_parse_pad_instrument() {
        assert_eq!(
            "Uploaded".parse::<PadInstrument>().unwrap(),
            PadInstrument::Uploaded
        );
        assert_eq!("none".parse::<PadInstrument>().unwrap(), PadInstrument::None);
        assert!("drums".parse::<PadInstrument>().is_err());
    }
}
