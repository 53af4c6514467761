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
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::catalog::{self, Layout, NoteTable};
use crate::notes::{self, PitchClass, MAX_NOTE};
use crate::range::Bounds;

/// The values an instrument falls back to for anything left out of the file.
pub(super) struct Defaults {
    pub name: &'static str,
    pub samples: &'static str,
    pub lower_bound: u8,
    pub upper_bound: u8,
    pub velocity_layers: u8,
    pub recorded: &'static [PitchClass],
    pub borrow: &'static [(u8, u8)],
    pub fade: Duration,
}

/// A grand piano recorded every minor third, 16 velocity layers.
pub(super) const PIANO: Defaults = Defaults {
    name: "Piano",
    samples: "samples/piano",
    lower_bound: 21,
    upper_bound: 108,
    velocity_layers: 16,
    recorded: &[PitchClass::C, PitchClass::DSharp, PitchClass::FSharp, PitchClass::A],
    // G#2 and G#3 were recorded badly and come from F#.
    borrow: &[(44, 42), (56, 54)],
    fade: Duration::from_secs(2),
};

pub(super) const SECONDARY: Defaults = Defaults {
    name: "Clarinet",
    samples: "samples/secondary",
    lower_bound: 50,
    upper_bound: 94,
    velocity_layers: 2,
    recorded: &PitchClass::ALL,
    borrow: &[],
    fade: Duration::from_secs(3),
};

const DEFAULT_EXTENSION: &str = "wav";

/// A YAML representation of a sampled instrument.
#[derive(Deserialize, Clone, Debug, Default)]
pub(super) struct Instrument {
    /// The name shown in range reports.
    name: Option<String>,

    /// The directory holding the recordings, relative to the config file.
    samples: Option<String>,

    /// The file extension of the recordings (default: wav).
    extension: Option<String>,

    /// The lowest playable MIDI note.
    lower_bound: Option<u8>,

    /// The highest playable MIDI note.
    upper_bound: Option<u8>,

    /// The number of velocity layers recorded per note.
    velocity_layers: Option<u8>,

    /// The pitch classes that have recordings.
    recorded: Option<Vec<PitchClass>>,

    /// Notes that take their recording from a specific other note.
    /// Keys and values are MIDI numbers or note names.
    borrow: Option<HashMap<String, String>>,

    /// How long a released note takes to fade out.
    fade: Option<String>,
}

/// Parses a MIDI number or a note name such as `G#2`.
fn note(value: &str) -> Result<u8, ConfigError> {
    match value.trim().parse::<u8>() {
        Ok(note) if note <= MAX_NOTE => Ok(note),
        _ => Ok(notes::parse_note(value)?),
    }
}

impl Instrument {
    pub fn name<'a>(&'a self, defaults: &'a Defaults) -> &'a str {
        self.name.as_deref().unwrap_or(defaults.name)
    }

    pub fn bounds(&self, defaults: &Defaults) -> Bounds {
        Bounds::new(
            self.lower_bound.unwrap_or(defaults.lower_bound),
            self.upper_bound.unwrap_or(defaults.upper_bound),
        )
    }

    pub fn fade(&self, defaults: &Defaults) -> Result<Duration, ConfigError> {
        match &self.fade {
            Some(fade) => parse_duration("fade", fade),
            None => Ok(defaults.fade),
        }
    }

    /// Returns the borrow table as MIDI note pairs.
    pub fn borrow(&self, defaults: &Defaults) -> Result<Vec<(u8, u8)>, ConfigError> {
        match &self.borrow {
            Some(borrow) => borrow
                .iter()
                .map(|(target, source)| Ok((note(target)?, note(source)?)))
                .collect(),
            None => Ok(defaults.borrow.to_vec()),
        }
    }

    /// Builds the on-disk layout. Relative sample directories are resolved
    /// against `base_path`.
    pub fn layout(&self, defaults: &Defaults, base_path: &Path) -> Result<Layout, ConfigError> {
        let samples = base_path.join(self.samples.as_deref().unwrap_or(defaults.samples));
        let recorded = match &self.recorded {
            Some(recorded) => recorded.clone(),
            None => defaults.recorded.to_vec(),
        };

        let layout = Layout::new(
            samples,
            self.bounds(defaults),
            self.velocity_layers.unwrap_or(defaults.velocity_layers),
        )
        .with_extension(self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION))
        .with_recorded(recorded);
        let layout = self
            .borrow(defaults)?
            .into_iter()
            .fold(layout, |layout, (target, source)| layout.with_borrow(target, source));

        layout.validate().map_err(|source| ConfigError::Catalog {
            instrument: self.name(defaults).to_string(),
            source,
        })?;
        Ok(layout)
    }

    /// Builds the instrument with its note table.
    pub fn to_instrument(
        &self,
        defaults: &Defaults,
        base_path: &Path,
    ) -> Result<catalog::Instrument, ConfigError> {
        let layout = self.layout(defaults, base_path)?;
        Ok(catalog::Instrument::new(
            self.name(defaults),
            NoteTable::build(&layout),
            self.fade(defaults)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::*;
    use crate::catalog::CatalogError;

    fn parse(yaml: &str) -> Instrument {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let instrument = Instrument::default().to_instrument(&PIANO, Path::new("/stage"))?;
        assert_eq!(instrument.name(), "Piano");
        assert_eq!(instrument.fade(), Duration::from_secs(2));
        assert_eq!(instrument.table().bounds(), Bounds::new(21, 108));

        // G#3 borrows F#3.
        let sample = instrument.table().resolve(56, 127).unwrap();
        assert_eq!(sample.path(), Path::new("/stage/samples/piano/F#3v16.wav"));
        assert!((sample.speed() - 2f32.powf(2.0 / 12.0)).abs() < 1e-6);

        let secondary = Instrument::default().to_instrument(&SECONDARY, Path::new("/stage"))?;
        assert_eq!(secondary.name(), "Clarinet");
        assert_eq!(secondary.fade(), Duration::from_secs(3));
        assert_eq!(
            secondary.table().resolve(50, 0).unwrap().path(),
            Path::new("/stage/samples/secondary/D3v1.wav")
        );
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<(), ConfigError> {
        let instrument = parse(
            r#"
            name: Rhodes
            samples: /opt/rhodes
            extension: flac
            lower_bound: 40
            upper_bound: 80
            velocity_layers: 4
            recorded: [C, E, G#]
            borrow:
              "a3": "G#3"
              "58": 56
            fade: 500ms
        "#,
        );

        assert_eq!(instrument.borrow(&PIANO)?.len(), 2);
        let instrument = instrument.to_instrument(&PIANO, Path::new("/stage"))?;
        assert_eq!(instrument.name(), "Rhodes");
        assert_eq!(instrument.fade(), Duration::from_millis(500));
        assert_eq!(instrument.table().bounds(), Bounds::new(40, 80));
        assert_eq!(
            instrument.table().resolve(57, 127).unwrap().path(),
            Path::new("/opt/rhodes/G#3v4.flac")
        );
        assert_eq!(
            instrument.table().resolve(58, 0).unwrap().path(),
            Path::new("/opt/rhodes/G#3v1.flac")
        );
        Ok(())
    }

    #[test]
    fn test_invalid() {
        let instrument = parse("borrow:\n  \"60\": \"55\"\n");
        assert!(matches!(
            instrument.layout(&PIANO, Path::new("/")),
            Err(ConfigError::Catalog {
                source: CatalogError::Borrow { .. },
                ..
            })
        ));

        let instrument = parse("velocity_layers: 0\n");
        assert!(matches!(
            instrument.layout(&PIANO, Path::new("/")),
            Err(ConfigError::Catalog {
                source: CatalogError::LayerCount(0),
                ..
            })
        ));

        let instrument = parse("borrow:\n  H2: C3\n");
        assert!(matches!(
            instrument.borrow(&PIANO),
            Err(ConfigError::Note(_))
        ));

        let instrument = parse("fade: forever\n");
        assert!(matches!(
            instrument.fade(&PIANO),
            Err(ConfigError::Duration { .. })
        ));
    }
}
