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

//! Voice management for monophonic-per-key sample playback.
//!
//! Every key (a note or an uploaded file) has at most one voice. Starting a key
//! that is already sounding hard-cuts the old voice first; stopping a key fades it
//! out and the voice is torn down by [`VoiceManager::tick`] once the fade is done.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::loader::{LoadError, SampleLoader};
use crate::audio::{self, Bus, VoiceControl, VoiceSource};
use crate::catalog::SampleRef;
use crate::notes;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("sample not found: {0}")]
    SampleNotFound(PathBuf),

    #[error("unable to load sample {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("audio device refused voice: {0}")]
    Device(String),
}

/// What a voice is keyed on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VoiceKey {
    /// A MIDI note played from an instrument catalog.
    Note(u8),
    /// An uploaded file played as-is.
    File(PathBuf),
}

impl fmt::Display for VoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceKey::Note(note) => write!(f, "{}", notes::note_name(*note)),
            VoiceKey::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    Playing,
    /// Fading out; torn down at the given instant.
    FadingOut { until: Instant },
}

/// An active voice.
pub struct Voice {
    id: u64,
    sample: SampleRef,
    gain: f32,
    bus: Bus,
    state: VoiceState,
    control: Arc<VoiceControl>,
}

impl Voice {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample(&self) -> &SampleRef {
        &self.sample
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn bus(&self) -> Bus {
        self.bus
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }
}

/// Owns the active-voice table.
pub struct VoiceManager {
    voices: HashMap<VoiceKey, Voice>,
    loader: SampleLoader,
    device: Arc<dyn audio::Device>,
    base_gain: f32,
}

impl VoiceManager {
    /// Creates a voice manager that plays through the given device at the given gain.
    pub fn new(device: Arc<dyn audio::Device>, base_gain: f32) -> VoiceManager {
        VoiceManager {
            voices: HashMap::new(),
            loader: SampleLoader::new(),
            device,
            base_gain,
        }
    }

    /// Decodes the given files ahead of time.
    pub fn preload<'a, I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = &'a Path>,
    {
        self.loader.preload(paths)
    }

    /// Starts a voice for `key`, hard-cutting any voice already on it.
    ///
    /// The velocity has already picked the sample layer; it's only logged here.
    /// A missing file leaves the table and any existing voice untouched.
    pub fn start(
        &mut self,
        key: VoiceKey,
        sample: &SampleRef,
        velocity: u8,
        bus: Bus,
    ) -> Result<(), VoiceError> {
        let path = sample.path();
        if !path.is_file() {
            warn!(key = %key, path = ?path, "Sample not found");
            return Err(VoiceError::SampleNotFound(path.to_path_buf()));
        }

        let loaded = self.loader.load(path).map_err(|source| VoiceError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(old) = self.voices.remove(&key) {
            debug!(key = %key, id = old.id, "Cutting existing voice");
            old.control.cancel();
        }

        let control = VoiceControl::new();
        let source = VoiceSource::new(
            loaded,
            sample.speed(),
            self.base_gain,
            bus,
            control.clone(),
        );
        self.device
            .play(source)
            .map_err(|e| VoiceError::Device(e.to_string()))?;

        let voice = Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed),
            sample: sample.clone(),
            gain: self.base_gain,
            bus,
            state: VoiceState::Playing,
            control,
        };
        info!(
            key = %key,
            id = voice.id,
            velocity,
            path = ?path,
            speed = sample.speed(),
            "Voice started"
        );
        self.voices.insert(key, voice);
        Ok(())
    }

    /// Fades out the voice on `key`. See [`VoiceManager::stop_at`].
    pub fn stop(&mut self, key: &VoiceKey, fade: Duration) {
        self.stop_at(key, fade, Instant::now())
    }

    /// Fades out the voice on `key` as of `now`. Missing keys and voices that are
    /// already fading are left alone; a zero fade removes the voice immediately.
    pub fn stop_at(&mut self, key: &VoiceKey, fade: Duration, now: Instant) {
        let Some(voice) = self.voices.get_mut(key) else {
            debug!(key = %key, "No voice to stop");
            return;
        };

        if fade.is_zero() {
            voice.control.cancel();
            self.voices.remove(key);
            info!(key = %key, "Voice cut");
            return;
        }

        if let VoiceState::FadingOut { .. } = voice.state {
            return;
        }

        voice.control.fade_out(fade);
        voice.state = VoiceState::FadingOut { until: now + fade };
        info!(key = %key, id = voice.id, fade_ms = fade.as_millis(), "Voice fading out");
    }

    /// Tears down voices whose fade has completed or whose sample ran out.
    /// Returns the number of voices removed.
    pub fn tick(&mut self, now: Instant) -> usize {
        let before = self.voices.len();
        self.voices.retain(|key, voice| {
            let done = match voice.state {
                VoiceState::FadingOut { until } => now >= until || voice.control.is_finished(),
                VoiceState::Playing => voice.control.is_finished(),
            };
            if done {
                voice.control.cancel();
                debug!(key = %key, id = voice.id, "Voice removed");
            }
            !done
        });
        before - self.voices.len()
    }

    /// Hard-cuts every voice.
    pub fn stop_all(&mut self) {
        for (_, voice) in self.voices.drain() {
            voice.control.cancel();
        }
    }

    /// Bytes held by decoded samples.
    pub fn cached_bytes(&self) -> usize {
        self.loader.total_memory_usage()
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, key: &VoiceKey) -> Option<&Voice> {
        self.voices.get(key)
    }

    pub fn device(&self) -> &Arc<dyn audio::Device> {
        &self.device
    }
}

impl fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.voices.len())
            .field("device", &self.device.to_string())
            .field("loader", &self.loader)
            .finish()
    }
}
