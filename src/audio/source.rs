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
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Bus;
use crate::samples::LoadedSample;

const NOT_FADING: u64 = u64::MAX;

/// Lock-free control shared between a voice and the audio thread rendering it.
#[derive(Debug)]
pub struct VoiceControl {
    cancelled: AtomicBool,
    fade_nanos: AtomicU64,
    finished: AtomicBool,
}

impl Default for VoiceControl {
    fn default() -> Self {
        VoiceControl {
            cancelled: AtomicBool::new(false),
            fade_nanos: AtomicU64::new(NOT_FADING),
            finished: AtomicBool::new(false),
        }
    }
}

impl VoiceControl {
    pub fn new() -> Arc<VoiceControl> {
        Arc::new(VoiceControl::default())
    }

    /// Silences the voice at the next rendered block.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Starts a linear fade to silence over the given duration. Only the first request counts.
    pub fn fade_out(&self, fade: Duration) {
        let nanos = u64::try_from(fade.as_nanos()).unwrap_or(NOT_FADING - 1);
        let _ = self.fade_nanos.compare_exchange(
            NOT_FADING,
            nanos.min(NOT_FADING - 1),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// The requested fade, if any.
    pub fn fade(&self) -> Option<Duration> {
        match self.fade_nanos.load(Ordering::Acquire) {
            NOT_FADING => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    /// True once the audio thread has stopped rendering the voice for any reason.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// A voice as rendered by the audio thread: a decoded sample read at a
/// variable rate with a gain that ramps to zero when faded out.
pub struct VoiceSource {
    sample: LoadedSample,
    speed: f64,
    gain: f32,
    bus: Bus,
    control: Arc<VoiceControl>,
    /// Read position in source frames.
    position: f64,
    /// Current fade multiplier and how much it drops per output frame.
    fade: Option<(f32, f32)>,
}

impl VoiceSource {
    pub fn new(
        sample: LoadedSample,
        speed: f32,
        gain: f32,
        bus: Bus,
        control: Arc<VoiceControl>,
    ) -> VoiceSource {
        VoiceSource {
            sample,
            speed: f64::from(speed),
            gain,
            bus,
            control,
            position: 0.0,
            fade: None,
        }
    }

    pub fn sample(&self) -> &LoadedSample {
        &self.sample
    }

    pub fn speed(&self) -> f32 {
        self.speed as f32
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn bus(&self) -> Bus {
        self.bus
    }

    pub fn control(&self) -> &Arc<VoiceControl> {
        &self.control
    }

    /// Adds this voice into an interleaved output buffer. Returns false once the
    /// voice is done and should be dropped by the mixer.
    pub fn mix_into(
        &mut self,
        output: &mut [f32],
        channels: usize,
        output_rate: u32,
        bus_gain: f32,
    ) -> bool {
        if self.control.is_cancelled() {
            self.control.finish();
            return false;
        }

        if self.fade.is_none() {
            if let Some(fade) = self.control.fade() {
                let frames = fade.as_secs_f64() * f64::from(output_rate);
                if frames < 1.0 {
                    self.control.finish();
                    return false;
                }
                self.fade = Some((1.0, (1.0 / frames) as f32));
            }
        }

        let channels = channels.max(1);
        let source_channels = usize::from(self.sample.channel_count().max(1));
        let frame_count = self.sample.frame_count();
        let step = self.speed * f64::from(self.sample.sample_rate()) / f64::from(output_rate.max(1));
        let gain = self.gain * bus_gain;

        for frame in output.chunks_exact_mut(channels) {
            let index = self.position as usize;
            if index >= frame_count {
                self.control.finish();
                return false;
            }

            let level = match self.fade.as_mut() {
                Some((level, drop)) => {
                    *level -= *drop;
                    if *level <= 0.0 {
                        self.control.finish();
                        return false;
                    }
                    *level
                }
                None => 1.0,
            };

            let frac = (self.position - index as f64) as f32;
            for (channel, out) in frame.iter_mut().enumerate() {
                let source_channel = channel % source_channels;
                let s0 = self.sample.sample(index, source_channel);
                let s1 = if index + 1 < frame_count {
                    self.sample.sample(index + 1, source_channel)
                } else {
                    s0
                };
                *out += (s0 + (s1 - s0) * frac) * gain * level;
            }

            self.position += step;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn constant(frames: usize, rate: u32) -> LoadedSample {
        LoadedSample::from_data(Path::new("test.wav"), vec![1.0; frames], 1, rate)
    }

    #[test]
    fn test_plays_to_end() {
        let control = VoiceControl::new();
        let mut source = VoiceSource::new(constant(4, 100), 1.0, 0.5, Bus::Piano, control.clone());

        let mut output = vec![0.0; 6];
        assert!(source.mix_into(&mut output, 2, 100, 1.0));
        assert_eq!(output, vec![0.5; 6]);
        assert!(!control.is_finished());

        let mut output = vec![0.0; 4];
        assert!(!source.mix_into(&mut output, 2, 100, 1.0));
        assert_eq!(output, vec![0.5, 0.5, 0.0, 0.0]);
        assert!(control.is_finished());
    }

    #[test]
    fn test_speed_shortens_playback() {
        let control = VoiceControl::new();
        let mut source = VoiceSource::new(constant(100, 100), 2.0, 1.0, Bus::Piano, control.clone());

        let mut output = vec![0.0; 49];
        assert!(source.mix_into(&mut output, 1, 100, 1.0));
        let mut output = vec![0.0; 2];
        assert!(!source.mix_into(&mut output, 1, 100, 1.0));
        assert_eq!(output, vec![1.0, 0.0]);
    }

    #[test]
    fn test_sample_rate_conversion() {
        let sample = LoadedSample::from_data(Path::new("ramp.wav"), vec![0.0, 1.0, 2.0], 1, 50);
        let mut source = VoiceSource::new(sample, 1.0, 1.0, Bus::Piano, VoiceControl::new());

        let mut output = vec![0.0; 4];
        assert!(source.mix_into(&mut output, 1, 100, 1.0));
        assert_eq!(output, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_fade_out_ramps_to_silence() {
        let control = VoiceControl::new();
        let mut source = VoiceSource::new(constant(1000, 100), 1.0, 1.0, Bus::Piano, control.clone());

        control.fade_out(Duration::from_millis(40));
        // A later request doesn't restart the ramp.
        control.fade_out(Duration::from_secs(10));
        assert_eq!(control.fade(), Some(Duration::from_millis(40)));

        let mut output = vec![0.0; 3];
        assert!(source.mix_into(&mut output, 1, 100, 1.0));
        assert!((output[0] - 0.75).abs() < 1e-6);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert!((output[2] - 0.25).abs() < 1e-6);

        let mut output = vec![0.0; 3];
        assert!(!source.mix_into(&mut output, 1, 100, 1.0));
        assert!(control.is_finished());
    }

    #[test]
    fn test_cancel_is_immediate() {
        let control = VoiceControl::new();
        let mut source = VoiceSource::new(constant(1000, 100), 1.0, 1.0, Bus::Secondary, control.clone());
        control.cancel();

        let mut output = vec![0.0; 8];
        assert!(!source.mix_into(&mut output, 2, 100, 1.0));
        assert_eq!(output, vec![0.0; 8]);
        assert!(control.is_finished());
    }
}
