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

//! Pitch classes and MIDI note names.
//!
//! Names use sharps only (`C#`, never `Db`), which is also how sample files are named.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The highest valid MIDI note number.
pub const MAX_NOTE: u8 = 127;

/// The twelve pitch classes of the chromatic scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown note name '{0}'")]
pub struct ParseNoteError(String);

impl PitchClass {
    /// All pitch classes in chromatic order starting at C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// The semitone index of this pitch class above C.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// The pitch class of the given MIDI note.
    pub fn of(note: u8) -> PitchClass {
        PitchClass::ALL[(note % 12) as usize]
    }

    /// The sharps-only name of this pitch class.
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        PitchClass::ALL
            .into_iter()
            .find(|pitch| pitch.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseNoteError(s.to_string()))
    }
}

impl TryFrom<String> for PitchClass {
    type Error = ParseNoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PitchClass> for String {
    fn from(value: PitchClass) -> Self {
        value.name().to_string()
    }
}

/// The octave of a MIDI note, where note 60 is in octave 4.
pub fn octave(note: u8) -> i32 {
    i32::from(note) / 12 - 1
}

/// The MIDI number for a pitch class in an octave. May fall far outside 0-127;
/// widened so any `i32` octave is representable.
pub fn midi_note(pitch: PitchClass, octave: i32) -> i64 {
    (i64::from(octave) + 1) * 12 + i64::from(pitch.index())
}

/// Formats a MIDI note as e.g. `C#4`.
pub fn note_name(note: u8) -> String {
    format!("{}{}", PitchClass::of(note), octave(note))
}

/// Parses a note name such as `G#2` or `a0` into a MIDI note number.
pub fn parse_note(name: &str) -> Result<u8, ParseNoteError> {
    let name = name.trim();
    let split = name
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .ok_or_else(|| ParseNoteError(name.to_string()))?;
    let pitch: PitchClass = name[..split]
        .parse()
        .map_err(|_| ParseNoteError(name.to_string()))?;
    let octave: i32 = name[split..]
        .parse()
        .map_err(|_| ParseNoteError(name.to_string()))?;

    u8::try_from(midi_note(pitch, octave))
        .ok()
        .filter(|note| *note <= MAX_NOTE)
        .ok_or_else(|| ParseNoteError(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(108), "C8");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_midi_note() {
        assert_eq!(midi_note(PitchClass::C, 4), 60);
        assert_eq!(midi_note(PitchClass::A, 0), 21);
        assert_eq!(midi_note(PitchClass::C, 8), 108);
        assert_eq!(midi_note(PitchClass::C, -2), -12);
        assert_eq!(midi_note(PitchClass::B, i32::MAX), (i64::from(i32::MAX) + 1) * 12 + 11);
        assert_eq!(midi_note(PitchClass::C, i32::MIN), (i64::from(i32::MIN) + 1) * 12);
    }

    #[test]
    fn test_parse_pitch_class() {
        assert_eq!("C#".parse::<PitchClass>(), Ok(PitchClass::CSharp));
        assert_eq!("a".parse::<PitchClass>(), Ok(PitchClass::A));
        assert_eq!(" F# ".parse::<PitchClass>(), Ok(PitchClass::FSharp));
        assert!("Db".parse::<PitchClass>().is_err());
        assert!("H".parse::<PitchClass>().is_err());
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("G#2"), Ok(44));
        assert_eq!(parse_note("f#2"), Ok(42));
        assert_eq!(parse_note("C-1"), Ok(0));
        assert_eq!(parse_note("G9"), Ok(127));
        assert!(parse_note("G#9").is_err());
        assert!(parse_note("C").is_err());
        assert!(parse_note("X4").is_err());
    }
}
