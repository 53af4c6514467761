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

//! Velocity-layered sample catalog.
//!
//! An instrument is recorded at a subset of pitch classes, each with a number of
//! velocity layers stored as `<note><octave>v<layer>.<ext>`. Notes that weren't
//! recorded borrow the closest recording and play it back at a shifted speed.
//! Building a catalog never touches the file system; missing files are only
//! discovered when a voice is started.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::notes::{self, PitchClass, MAX_NOTE};
use crate::range::Bounds;

/// The highest MIDI velocity.
pub const MAX_VELOCITY: u8 = 127;

/// Borrowed recordings may be shifted at most this far down.
const MIN_SHIFT: i16 = -1;

/// Borrowed recordings may be shifted at most this far up.
const MAX_SHIFT: i16 = 2;

/// Source offsets tried, in order, for notes without their own recording.
const NEAREST_OFFSETS: [i16; 4] = [0, -1, 1, -2];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("velocity layer count must be between 1 and 128, got {0}")]
    LayerCount(u16),

    #[error("note {note} borrows from {source_note}, a shift of {shift} semitones (allowed: -1 to +2)")]
    Borrow { note: u8, source_note: u8, shift: i16 },

    #[error("no pitch classes are recorded")]
    NothingRecorded,
}

/// An inclusive range of velocities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VelocityRange {
    low: u8,
    high: u8,
}

impl VelocityRange {
    pub fn new(low: u8, high: u8) -> VelocityRange {
        VelocityRange { low, high }
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }

    pub fn contains(&self, velocity: u8) -> bool {
        (self.low..=self.high).contains(&velocity)
    }

    /// Splits 0-127 into `layers` equal-width ranges. The last range absorbs any
    /// remainder so the partition is always complete.
    pub fn partition(layers: u8) -> Vec<VelocityRange> {
        let layers = u16::from(layers.clamp(1, 128));
        let step = 128 / layers;
        (0..layers)
            .map(|i| {
                let low = i * step;
                let high = if i == layers - 1 {
                    u16::from(MAX_VELOCITY)
                } else {
                    low + step - 1
                };
                VelocityRange::new(low as u8, high as u8)
            })
            .collect()
    }
}

/// A concrete file to play and the speed to play it at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleRef {
    path: PathBuf,
    speed: f32,
}

impl SampleRef {
    /// A sample played back unchanged.
    pub fn unshifted(path: PathBuf) -> SampleRef {
        SampleRef { path, speed: 1.0 }
    }

    /// A sample shifted by the given number of semitones.
    pub fn shifted(path: PathBuf, semitones: i16) -> SampleRef {
        SampleRef {
            path,
            speed: 2f32.powf(f32::from(semitones) / 12.0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The playback speed; 1.0 means no resampling.
    pub fn speed(&self) -> f32 {
        self.speed
    }
}

/// One velocity layer of a note.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layer {
    range: VelocityRange,
    sample: SampleRef,
}

impl Layer {
    pub fn range(&self) -> VelocityRange {
        self.range
    }

    pub fn sample(&self) -> &SampleRef {
        &self.sample
    }
}

/// Describes how an instrument's recordings are laid out on disk.
#[derive(Clone, Debug)]
pub struct Layout {
    directory: PathBuf,
    extension: String,
    bounds: Bounds,
    velocity_layers: u8,
    recorded: BTreeSet<PitchClass>,
    borrow: BTreeMap<u8, u8>,
}

impl Layout {
    /// Creates a layout where every pitch class is recorded.
    pub fn new(directory: PathBuf, bounds: Bounds, velocity_layers: u8) -> Layout {
        Layout {
            directory,
            extension: "wav".to_string(),
            bounds,
            velocity_layers,
            recorded: PitchClass::ALL.into_iter().collect(),
            borrow: BTreeMap::new(),
        }
    }

    /// Sets the file extension of the recordings.
    pub fn with_extension(mut self, extension: &str) -> Layout {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Sets the pitch classes that have recordings.
    pub fn with_recorded<I: IntoIterator<Item = PitchClass>>(mut self, recorded: I) -> Layout {
        self.recorded = recorded.into_iter().collect();
        self
    }

    /// Makes `note` borrow from `source_note` regardless of what's recorded.
    pub fn with_borrow(mut self, note: u8, source_note: u8) -> Layout {
        self.borrow.insert(note, source_note);
        self
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Checks the layout for values the catalog can't represent.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.velocity_layers == 0 || u16::from(self.velocity_layers) > 128 {
            return Err(CatalogError::LayerCount(u16::from(self.velocity_layers)));
        }
        if self.recorded.is_empty() {
            return Err(CatalogError::NothingRecorded);
        }
        for (&note, &source_note) in &self.borrow {
            let shift = i16::from(note) - i16::from(source_note);
            if !(MIN_SHIFT..=MAX_SHIFT).contains(&shift) {
                return Err(CatalogError::Borrow {
                    note,
                    source_note,
                    shift,
                });
            }
        }
        Ok(())
    }

    /// Finds the recorded note that supplies `note` and the shift in semitones.
    fn source_for(&self, note: u8) -> Option<(u8, i16)> {
        if let Some(&source) = self.borrow.get(&note) {
            return Some((source, i16::from(note) - i16::from(source)));
        }

        NEAREST_OFFSETS.iter().find_map(|&offset| {
            let source = i16::from(note) + offset;
            let source = u8::try_from(source).ok().filter(|s| *s <= MAX_NOTE)?;
            self.recorded
                .contains(&PitchClass::of(source))
                .then_some((source, -offset))
        })
    }

    fn file_for(&self, source: u8, layer: usize) -> PathBuf {
        self.directory.join(format!(
            "{}v{}.{}",
            notes::note_name(source),
            layer + 1,
            self.extension
        ))
    }
}

/// The velocity layers for every note of an instrument.
#[derive(Clone, Debug, Serialize)]
pub struct NoteTable {
    #[serde(skip)]
    bounds: Bounds,
    notes: BTreeMap<u8, Vec<Layer>>,
}

impl NoteTable {
    /// Builds the table for every note within the layout's bounds.
    pub fn build(layout: &Layout) -> NoteTable {
        let ranges = VelocityRange::partition(layout.velocity_layers);
        let mut notes = BTreeMap::new();

        for note in layout.bounds.lower()..=layout.bounds.upper() {
            let Some((source, shift)) = layout.source_for(note) else {
                debug!(note, "No recording close enough to note");
                continue;
            };

            let layers = ranges
                .iter()
                .enumerate()
                .map(|(layer, range)| Layer {
                    range: *range,
                    sample: SampleRef::shifted(layout.file_for(source, layer), shift),
                })
                .collect();
            notes.insert(note, layers);
        }

        debug!(
            directory = ?layout.directory,
            notes = notes.len(),
            layers = ranges.len(),
            "Note table built"
        );

        NoteTable {
            bounds: layout.bounds,
            notes,
        }
    }

    /// Resolves the sample for a note played at a velocity.
    pub fn resolve(&self, note: u8, velocity: u8) -> Option<&SampleRef> {
        self.notes
            .get(&note)?
            .iter()
            .find(|layer| layer.range.contains(velocity))
            .map(|layer| &layer.sample)
    }

    /// The layers of a single note.
    pub fn layers(&self, note: u8) -> Option<&[Layer]> {
        self.notes.get(&note).map(Vec::as_slice)
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// The notes that have layers, in ascending order.
    pub fn notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.keys().copied()
    }

    /// Every distinct file referenced by the table.
    pub fn files(&self) -> BTreeSet<&Path> {
        self.notes
            .values()
            .flatten()
            .map(|layer| layer.sample.path())
            .collect()
    }
}

/// A playable instrument: its catalog plus how it releases.
#[derive(Clone, Debug)]
pub struct Instrument {
    name: String,
    table: NoteTable,
    fade: Duration,
}

impl Instrument {
    pub fn new(name: &str, table: NoteTable, fade: Duration) -> Instrument {
        Instrument {
            name: name.to_string(),
            table,
            fade,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &NoteTable {
        &self.table
    }

    /// How long a released note takes to fade out.
    pub fn fade(&self) -> Duration {
        self.fade
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piano_layout() -> Layout {
        Layout::new(PathBuf::from("/samples/piano"), Bounds::new(21, 108), 16)
            .with_recorded([
                PitchClass::C,
                PitchClass::DSharp,
                PitchClass::FSharp,
                PitchClass::A,
            ])
            .with_borrow(44, 42)
            .with_borrow(56, 54)
    }

    fn assert_sample(table: &NoteTable, note: u8, velocity: u8, file: &str, semitones: i16) {
        let sample = table
            .resolve(note, velocity)
            .unwrap_or_else(|| panic!("note {} should resolve", note));
        assert_eq!(sample.path(), Path::new("/samples/piano").join(file));
        let expected = 2f32.powf(f32::from(semitones) / 12.0);
        assert!(
            (sample.speed() - expected).abs() < 1e-6,
            "note {} speed {} != {}",
            note,
            sample.speed(),
            expected
        );
    }

    #[test]
    fn test_partition_is_complete() {
        for layers in 1..=128u8 {
            let ranges = VelocityRange::partition(layers);
            assert_eq!(ranges.len(), layers as usize);
            assert_eq!(ranges[0].low(), 0);
            assert_eq!(ranges[ranges.len() - 1].high(), MAX_VELOCITY);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].high() + 1, pair[1].low(), "{} layers", layers);
            }
        }
    }

    #[test]
    fn test_partition_sixteen_and_two() {
        let ranges = VelocityRange::partition(16);
        assert_eq!(ranges[0], VelocityRange::new(0, 7));
        assert_eq!(ranges[6], VelocityRange::new(48, 55));
        assert_eq!(ranges[15], VelocityRange::new(120, 127));

        let ranges = VelocityRange::partition(2);
        assert_eq!(ranges, vec![VelocityRange::new(0, 63), VelocityRange::new(64, 127)]);
    }

    #[test]
    fn test_piano_mapping() {
        let table = NoteTable::build(&piano_layout());

        assert_sample(&table, 21, 0, "A0v1.wav", 0);
        assert_sample(&table, 22, 0, "A0v1.wav", 1);
        assert_sample(&table, 23, 0, "C1v1.wav", -1);
        assert_sample(&table, 26, 0, "D#1v1.wav", -1);
        assert_sample(&table, 28, 0, "D#1v1.wav", 1);
        assert_sample(&table, 32, 0, "A1v1.wav", -1);
        assert_sample(&table, 35, 0, "C2v1.wav", -1);
        assert_sample(&table, 44, 0, "F#2v1.wav", 2);
        assert_sample(&table, 56, 0, "F#3v1.wav", 2);
        assert_sample(&table, 60, 50, "C4v7.wav", 0);
        assert_sample(&table, 64, 100, "D#4v13.wav", 1);
        assert_sample(&table, 108, 127, "C8v16.wav", 0);
    }

    #[test]
    fn test_every_note_covers_all_velocities() {
        for layout in [
            piano_layout(),
            Layout::new(PathBuf::from("/samples/clarinet"), Bounds::new(50, 94), 2),
            Layout::new(PathBuf::from("/samples/odd"), Bounds::new(0, 127), 3),
        ] {
            let table = NoteTable::build(&layout);
            for note in table.notes() {
                let layers = table.layers(note).unwrap();
                assert_eq!(layers[0].range().low(), 0);
                assert_eq!(layers[layers.len() - 1].range().high(), MAX_VELOCITY);
                for pair in layers.windows(2) {
                    assert_eq!(pair[0].range().high() + 1, pair[1].range().low());
                }
            }
        }
    }

    #[test]
    fn test_resolve_outside_range() {
        let table = NoteTable::build(&piano_layout());
        assert!(table.resolve(20, 64).is_none());
        assert!(table.resolve(109, 64).is_none());
        assert!(table.resolve(60, 128).is_none());
        assert!(table.layers(20).is_none());
    }

    #[test]
    fn test_resolve_is_pure() {
        let table = NoteTable::build(&piano_layout());
        for velocity in 0..=MAX_VELOCITY {
            assert_eq!(table.resolve(61, velocity), table.resolve(61, velocity));
        }
    }

    #[test]
    fn test_sparse_recordings_skip_unreachable_notes() {
        let layout = Layout::new(PathBuf::from("/s"), Bounds::new(60, 72), 1)
            .with_recorded([PitchClass::C]);
        let table = NoteTable::build(&layout);
        // C4, C#4 (+1), D4 (+2) and B4 (-1) reach a C recording; the rest don't.
        assert_eq!(table.notes().collect::<Vec<_>>(), vec![60, 61, 62, 71, 72]);
    }

    #[test]
    fn test_files_and_extension() {
        let layout = Layout::new(PathBuf::from("/s"), Bounds::new(60, 61), 2)
            .with_recorded([PitchClass::C])
            .with_extension(".flac");
        let table = NoteTable::build(&layout);
        let files: Vec<_> = table.files().into_iter().collect();
        assert_eq!(
            files,
            vec![Path::new("/s/C4v1.flac"), Path::new("/s/C4v2.flac")]
        );
    }

    #[test]
    fn test_validate() {
        assert!(piano_layout().validate().is_ok());
        assert_eq!(
            piano_layout().with_borrow(50, 46).validate(),
            Err(CatalogError::Borrow {
                note: 50,
                source_note: 46,
                shift: 4
            })
        );
        assert_eq!(
            Layout::new(PathBuf::from("/s"), Bounds::full(), 0).validate(),
            Err(CatalogError::LayerCount(0))
        );
        assert_eq!(
            Layout::new(PathBuf::from("/s"), Bounds::full(), 4)
                .with_recorded([])
                .validate(),
            Err(CatalogError::NothingRecorded)
        );
    }
}
