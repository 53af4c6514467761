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
use std::{
    collections::{HashMap, VecDeque},
    error::Error,
    fmt,
    path::PathBuf,
    sync::Arc,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{mixer::Mixer, Bus, Gains, VoiceControl, VoiceSource, Volume};

const SAMPLE_RATE: u32 = 44100;
const CHANNELS: u16 = 2;

/// The most recent plays kept by `played`. Older records are dropped.
const PLAYED_LOG_LIMIT: usize = 1024;

/// A record of a voice the mock device was asked to play.
#[derive(Clone, Debug)]
pub struct Played {
    pub path: PathBuf,
    pub speed: f32,
    pub gain: f32,
    pub bus: Bus,
    pub control: Arc<VoiceControl>,
}

/// A mock device. Doesn't output anything, but mixes on demand for tests.
#[derive(Clone)]
pub struct Device {
    name: String,
    gains: Arc<Gains>,
    played: Arc<Mutex<VecDeque<Played>>>,
    volumes: Arc<Mutex<HashMap<Volume, f32>>>,
    sources: Sender<VoiceSource>,
    mixer: Arc<Mutex<Mixer>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        let (sources, receiver) = crossbeam_channel::unbounded();
        let gains = Arc::new(Gains::default());
        Device {
            name: name.to_string(),
            gains: gains.clone(),
            played: Arc::new(Mutex::new(VecDeque::new())),
            volumes: Arc::new(Mutex::new(HashMap::new())),
            sources,
            mixer: Arc::new(Mutex::new(Mixer::new(
                receiver,
                CHANNELS,
                SAMPLE_RATE,
                gains,
            ))),
        }
    }

    /// The most recent voices played, oldest first.
    pub fn played(&self) -> Vec<Played> {
        self.played.lock().iter().cloned().collect()
    }

    /// The last volume set for the given control, if any.
    pub fn volume(&self, volume: Volume) -> Option<f32> {
        self.volumes.lock().get(&volume).copied()
    }

    /// Mixes the given number of frames of all active voices.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * usize::from(CHANNELS)];
        self.mixer.lock().mix(&mut output);
        output
    }

    /// The number of voices the mixer still holds.
    pub fn active_count(&self) -> usize {
        let mut mixer = self.mixer.lock();
        mixer.prune();
        mixer.active_count()
    }
}

impl super::Device for Device {
    fn play(&self, source: VoiceSource) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::DEBUG, "play voice (mock)");
        let _enter = span.enter();

        let played = Played {
            path: source.sample().path().to_path_buf(),
            speed: source.speed(),
            gain: source.gain(),
            bus: source.bus(),
            control: source.control().clone(),
        };
        info!(
            device = self.name,
            path = ?played.path,
            speed = played.speed,
            "Playing voice."
        );
        {
            let mut log = self.played.lock();
            if log.len() == PLAYED_LOG_LIMIT {
                log.pop_front();
            }
            log.push_back(played);
        }
        self.sources.send(source)?;

        // Nothing renders in a mock run, so drop cut voices here to bound memory.
        self.mixer.lock().prune();
        Ok(())
    }

    fn set_volume(&self, volume: Volume, gain: f32) {
        self.gains.set(volume, gain);
        self.volumes.lock().insert(volume, gain);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::audio::Device as _;
    use crate::samples::LoadedSample;

    #[test]
    fn test_records_and_renders() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock");
        let control = VoiceControl::new();
        let sample = LoadedSample::from_data(Path::new("C4v1.wav"), vec![1.0; 100], 1, SAMPLE_RATE);
        device.play(VoiceSource::new(sample, 1.5, 0.5, Bus::Piano, control.clone()))?;
        device.set_volume(Volume::Master, 0.5);

        let played = device.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].path, PathBuf::from("C4v1.wav"));
        assert_eq!(played[0].speed, 1.5);
        assert_eq!(played[0].bus, Bus::Piano);
        assert_eq!(device.volume(Volume::Master), Some(0.5));

        let output = device.render(2);
        assert_eq!(output, vec![0.25; 4]);
        assert_eq!(device.active_count(), 1);

        control.cancel();
        assert_eq!(device.active_count(), 0);
        Ok(())
    }

    #[test]
    fn test_played_log_is_capped() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock");
        for i in 0..PLAYED_LOG_LIMIT + 10 {
            let path = PathBuf::from(format!("{}.wav", i));
            let sample = LoadedSample::from_data(&path, vec![0.0; 1], 1, SAMPLE_RATE);
            device.play(VoiceSource::new(sample, 1.0, 0.5, Bus::Piano, VoiceControl::new()))?;
        }

        let played = device.played();
        assert_eq!(played.len(), PLAYED_LOG_LIMIT);
        assert_eq!(played[0].path, PathBuf::from("10.wav"));
        assert_eq!(
            played[PLAYED_LOG_LIMIT - 1].path,
            PathBuf::from(format!("{}.wav", PLAYED_LOG_LIMIT + 9))
        );
        Ok(())
    }
}
