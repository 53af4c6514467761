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
use std::sync::atomic::{AtomicU32, Ordering};
use std::str::FromStr;
use std::{error::Error, fmt, sync::Arc};

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod source;
mod thread_priority;

pub use source::{VoiceControl, VoiceSource};

/// The per-instrument gain stage a voice is mixed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bus {
    Piano,
    Secondary,
    Uploaded,
}

/// A volume control: the master gain or one of the bus gains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Volume {
    Master,
    Bus(Bus),
}

#[derive(Debug, thiserror::Error)]
#[error("unknown volume '{0}', expected master, piano, secondary or uploaded")]
pub struct ParseVolumeError(String);

impl FromStr for Volume {
    type Err = ParseVolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "master" => Ok(Volume::Master),
            "piano" => Ok(Volume::Bus(Bus::Piano)),
            "secondary" => Ok(Volume::Bus(Bus::Secondary)),
            "uploaded" => Ok(Volume::Bus(Bus::Uploaded)),
            _ => Err(ParseVolumeError(s.to_string())),
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volume::Master => write!(f, "master"),
            Volume::Bus(Bus::Piano) => write!(f, "piano"),
            Volume::Bus(Bus::Secondary) => write!(f, "secondary"),
            Volume::Bus(Bus::Uploaded) => write!(f, "uploaded"),
        }
    }
}

/// Gain values shared with the audio thread, stored as f32 bits.
#[derive(Debug)]
pub struct Gains {
    master: AtomicU32,
    piano: AtomicU32,
    secondary: AtomicU32,
    uploaded: AtomicU32,
}

impl Default for Gains {
    fn default() -> Self {
        let unity = 1.0f32.to_bits();
        Gains {
            master: AtomicU32::new(unity),
            piano: AtomicU32::new(unity),
            secondary: AtomicU32::new(unity),
            uploaded: AtomicU32::new(unity),
        }
    }
}

impl Gains {
    fn slot(&self, volume: Volume) -> &AtomicU32 {
        match volume {
            Volume::Master => &self.master,
            Volume::Bus(Bus::Piano) => &self.piano,
            Volume::Bus(Bus::Secondary) => &self.secondary,
            Volume::Bus(Bus::Uploaded) => &self.uploaded,
        }
    }

    /// Sets a gain. Negative values are treated as silence.
    pub fn set(&self, volume: Volume, gain: f32) {
        self.slot(volume)
            .store(gain.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, volume: Volume) -> f32 {
        f32::from_bits(self.slot(volume).load(Ordering::Relaxed))
    }

    /// The combined master and bus gain.
    pub fn bus(&self, bus: Bus) -> f32 {
        self.get(Volume::Master) * self.get(Volume::Bus(bus))
    }
}

pub trait Device: fmt::Display + Send + Sync {
    /// Hands a voice to the audio thread. Never blocks on audio I/O.
    fn play(&self, source: VoiceSource) -> Result<(), Box<dyn Error>>;

    /// Sets the master or a bus volume.
    fn set_volume(&self, volume: Volume, gain: f32);
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with `mock` create a mock device.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gains() {
        let gains = Gains::default();
        assert_eq!(gains.bus(Bus::Piano), 1.0);

        gains.set(Volume::Master, 0.5);
        gains.set(Volume::Bus(Bus::Secondary), 0.5);
        gains.set(Volume::Bus(Bus::Uploaded), -1.0);
        assert_eq!(gains.bus(Bus::Piano), 0.5);
        assert_eq!(gains.bus(Bus::Secondary), 0.25);
        assert_eq!(gains.bus(Bus::Uploaded), 0.0);
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!("Master".parse::<Volume>().unwrap(), Volume::Master);
        assert_eq!(
            "uploaded".parse::<Volume>().unwrap(),
            Volume::Bus(Bus::Uploaded)
        );
        assert!("drums".parse::<Volume>().is_err());
    }

    #[test]
    fn test_get_mock_device() -> Result<(), Box<dyn Error>> {
        let device = get_device("mock-test")?;
        assert_eq!(device.to_string(), "mock-test (Mock)");
        Ok(())
    }
}
