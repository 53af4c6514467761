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

//! Sample decoding and caching.
//!
//! Samples are decoded entirely into memory the first time they're played (or at
//! startup when preloading) so starting a voice never touches the disk twice.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to open sample: {0}")]
    Io(#[from] io::Error),

    #[error("unable to decode sample: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("no audio track found")]
    NoTrack,

    #[error("sample rate not specified")]
    UnknownSampleRate,
}

/// A decoded sample. The data is shared between every voice playing it.
#[derive(Clone)]
pub struct LoadedSample {
    path: PathBuf,
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl LoadedSample {
    #[cfg(test)]
    pub fn from_data(path: &Path, data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        LoadedSample {
            path: path.to_path_buf(),
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / usize::from(self.channel_count.max(1))
    }

    /// The sample at the given frame and channel, or silence past the end.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * usize::from(self.channel_count) + channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate.max(1)))
    }

    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Decodes samples and caches them by path.
#[derive(Default)]
pub struct SampleLoader {
    cache: HashMap<PathBuf, LoadedSample>,
}

impl SampleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a sample, returning the cached copy if it was already decoded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        let sample = decode(path)?;
        self.cache.insert(path.to_path_buf(), sample.clone());
        Ok(sample)
    }

    /// Decodes every given file in parallel. Files that fail are logged and skipped.
    /// Returns the number of samples now cached.
    pub fn preload<'a, I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let pending: Vec<&Path> = paths
            .into_iter()
            .filter(|path| !self.cache.contains_key(*path))
            .collect();

        let decoded: Vec<LoadedSample> = pending
            .par_iter()
            .filter_map(|path| match decode(path) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!(path = ?path, err = %e, "Unable to preload sample");
                    None
                }
            })
            .collect();

        for sample in decoded {
            self.cache.insert(sample.path.clone(), sample);
        }

        info!(
            samples = self.cache.len(),
            memory_kb = self.total_memory_usage() / 1024,
            "Samples preloaded"
        );
        self.cache.len()
    }

    /// The total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(LoadedSample::memory_size).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes an entire file into interleaved f32 samples.
fn decode(path: &Path) -> Result<LoadedSample, LoadError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.ok_or(LoadError::UnknownSampleRate)?;
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder =
        symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

    let mut data = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channel_count = spec.channels.count() as u16;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                data.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let sample = LoadedSample {
        path: path.to_path_buf(),
        data: Arc::new(data),
        channel_count: channel_count.max(1),
        sample_rate,
    };

    info!(
        path = ?path,
        channels = sample.channel_count,
        sample_rate,
        duration_ms = sample.duration().as_millis(),
        memory_kb = sample.memory_size() / 1024,
        "Sample loaded"
    );

    Ok(sample)
}
