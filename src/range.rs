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

//! Assignment of a contiguous window of MIDI notes to the pads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::notes::{self, PitchClass, MAX_NOTE};

/// The number of physical pads.
pub const PAD_COUNT: usize = 20;

/// Which instrument library the pads are playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentSelector {
    /// Every pad plays the piano.
    Piano,
    /// Every pad plays the secondary instrument.
    Secondary,
    /// Each pad plays the instrument assigned to it.
    Custom,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown instrument '{0}', expected piano, secondary or custom")]
pub struct ParseSelectorError(String);

impl FromStr for InstrumentSelector {
    type Err = ParseSelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piano" => Ok(InstrumentSelector::Piano),
            "secondary" => Ok(InstrumentSelector::Secondary),
            "custom" => Ok(InstrumentSelector::Custom),
            _ => Err(ParseSelectorError(s.to_string())),
        }
    }
}

impl fmt::Display for InstrumentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentSelector::Piano => write!(f, "piano"),
            InstrumentSelector::Secondary => write!(f, "secondary"),
            InstrumentSelector::Custom => write!(f, "custom"),
        }
    }
}

/// The inclusive MIDI note range an instrument can play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    lower: u8,
    upper: u8,
}

impl Bounds {
    /// Creates new bounds. The values are ordered and capped to the MIDI range.
    pub fn new(lower: u8, upper: u8) -> Bounds {
        let lower = lower.min(MAX_NOTE);
        let upper = upper.min(MAX_NOTE);
        Bounds {
            lower: lower.min(upper),
            upper: lower.max(upper),
        }
    }

    /// The full MIDI range.
    pub fn full() -> Bounds {
        Bounds::new(0, MAX_NOTE)
    }

    pub fn lower(&self) -> u8 {
        self.lower
    }

    pub fn upper(&self) -> u8 {
        self.upper
    }

    /// The highest start note that still leaves room for every pad.
    fn highest_start(&self) -> i64 {
        i64::from(self.upper) - (PAD_COUNT as i64 - 1)
    }
}

/// How the requested start note had to be corrected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    /// The requested start fit.
    None,
    /// The requested start was too high and was lowered.
    Lowered,
    /// The requested start was too low and was raised.
    Raised,
}

/// The notes currently assigned to the pads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeAssignment {
    start: u8,
    notes: Vec<u8>,
    adjustment: Adjustment,
}

/// Computes the pad assignment for the requested start note and octave.
///
/// The start is clamped into the instrument's bounds so that all pads are
/// populated where possible. Notes past the upper bound are truncated, not wrapped.
pub fn assign(start_note: PitchClass, start_octave: i32, bounds: Bounds) -> RangeAssignment {
    let requested = notes::midi_note(start_note, start_octave);
    let lower = i64::from(bounds.lower);
    let highest = bounds.highest_start();

    let (start, adjustment) = if highest < lower {
        // The instrument holds fewer notes than there are pads.
        let adjustment = match requested.cmp(&lower) {
            std::cmp::Ordering::Equal => Adjustment::None,
            std::cmp::Ordering::Greater => Adjustment::Lowered,
            std::cmp::Ordering::Less => Adjustment::Raised,
        };
        (lower, adjustment)
    } else if requested > highest {
        (highest, Adjustment::Lowered)
    } else if requested < lower {
        (lower, Adjustment::Raised)
    } else {
        (requested, Adjustment::None)
    };

    // Both branches above keep start within [lower, upper].
    let start = start as u8;
    let notes = (0..PAD_COUNT as u8)
        .map_while(|offset| {
            start
                .checked_add(offset)
                .filter(|note| *note <= bounds.upper)
        })
        .collect();

    RangeAssignment {
        start,
        notes,
        adjustment,
    }
}

impl RangeAssignment {
    /// The first assigned MIDI note.
    pub fn start(&self) -> u8 {
        self.start
    }

    /// The start as a pitch class and octave, suitable for re-applying.
    pub fn start_note(&self) -> (PitchClass, i32) {
        (PitchClass::of(self.start), notes::octave(self.start))
    }

    /// The assigned notes, one per pad starting at pad 0.
    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    /// The note played by the 0-indexed pad, if the window reaches it.
    pub fn note_for_pad(&self, pad: usize) -> Option<u8> {
        self.notes.get(pad).copied()
    }

    /// The 0-indexed pad playing the given note, if any.
    pub fn pad_for_note(&self, note: u8) -> Option<usize> {
        self.notes.iter().position(|n| *n == note)
    }

    pub fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    /// The human readable note range, e.g. `C4-G5`.
    pub fn range_text(&self) -> String {
        match (self.notes.first(), self.notes.last()) {
            (Some(first), Some(last)) => {
                format!("{}-{}", notes::note_name(*first), notes::note_name(*last))
            }
            _ => String::new(),
        }
    }

    /// The lines to show the user after this assignment was made.
    pub fn report(&self, instrument: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let start = notes::note_name(self.start);
        match self.adjustment {
            Adjustment::None => {}
            Adjustment::Lowered => lines.push(format!(
                "Index too high for twenty notes to all be populated on the pulsepad. \
                 Adjusted to highest available: {}",
                start
            )),
            Adjustment::Raised => lines.push(format!(
                "Index too low for twenty notes to all be populated on the pulsepad. \
                 Adjusted to lowest available: {}",
                start
            )),
        }
        lines.push(format!("{} range: {}", instrument, self.range_text()));
        lines
    }
}
