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
// Voice mixing shared by the cpal and mock devices.
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::{Gains, VoiceSource};

/// Voices are expected to be few; this avoids growing the list on the audio thread.
const INITIAL_CAPACITY: usize = 64;

/// Sums active voices into an interleaved output buffer.
pub struct Mixer {
    sources: Vec<VoiceSource>,
    receiver: Receiver<VoiceSource>,
    channels: u16,
    sample_rate: u32,
    gains: Arc<Gains>,
}

impl Mixer {
    pub fn new(
        receiver: Receiver<VoiceSource>,
        channels: u16,
        sample_rate: u32,
        gains: Arc<Gains>,
    ) -> Mixer {
        Mixer {
            sources: Vec::with_capacity(INITIAL_CAPACITY),
            receiver,
            channels,
            sample_rate,
            gains,
        }
    }

    /// Picks up voices handed over since the last call.
    fn receive(&mut self) {
        while let Ok(source) = self.receiver.try_recv() {
            self.sources.push(source);
        }
    }

    /// Receives new voices and drops cancelled ones without rendering.
    pub fn prune(&mut self) {
        self.receive();
        self.sources
            .retain(|source| !source.control().is_cancelled());
    }

    /// Overwrites `output` with the mix of every active voice.
    pub fn mix(&mut self, output: &mut [f32]) {
        self.receive();
        output.fill(0.0);

        let channels = usize::from(self.channels);
        let sample_rate = self.sample_rate;
        let gains = &self.gains;
        self.sources.retain_mut(|source| {
            let bus_gain = gains.bus(source.bus());
            source.mix_into(output, channels, sample_rate, bus_gain)
        });
    }

    pub fn active_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::audio::{Bus, VoiceControl, Volume};
    use crate::samples::LoadedSample;

    fn source(level: f32, frames: usize, bus: Bus) -> (VoiceSource, Arc<VoiceControl>) {
        let control = VoiceControl::new();
        let sample = LoadedSample::from_data(Path::new("s.wav"), vec![level; frames], 1, 100);
        (VoiceSource::new(sample, 1.0, 1.0, bus, control.clone()), control)
    }

    #[test]
    fn test_mix_sums_with_bus_gain() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let gains = Arc::new(Gains::default());
        let mut mixer = Mixer::new(rx, 1, 100, gains.clone());
        gains.set(Volume::Bus(Bus::Secondary), 0.5);

        let (piano, _) = source(0.25, 10, Bus::Piano);
        let (secondary, _) = source(0.5, 10, Bus::Secondary);
        tx.send(piano).unwrap();
        tx.send(secondary).unwrap();

        let mut output = vec![1.0; 4];
        mixer.mix(&mut output);
        assert_eq!(mixer.active_count(), 2);
        assert_eq!(output, vec![0.5; 4]);

        gains.set(Volume::Master, 0.0);
        mixer.mix(&mut output);
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn test_finished_voices_are_dropped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(rx, 1, 100, Arc::new(Gains::default()));

        let (short, short_control) = source(1.0, 2, Bus::Piano);
        let (long, long_control) = source(1.0, 100, Bus::Piano);
        tx.send(short).unwrap();
        tx.send(long).unwrap();

        let mut output = vec![0.0; 4];
        mixer.mix(&mut output);
        assert_eq!(output, vec![2.0, 2.0, 1.0, 1.0]);
        assert_eq!(mixer.active_count(), 1);
        assert!(short_control.is_finished());

        long_control.cancel();
        mixer.prune();
        assert_eq!(mixer.active_count(), 0);
    }
}
