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

use std::{error::Error, fs::File, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes a 16-bit WAV file. `frames` holds one `Vec` per frame, one sample per channel.
pub fn write_wav(path: &Path, frames: &[Vec<i16>], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let channels = frames.first().map(Vec::len).unwrap_or(1);
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: u16::try_from(channels)?,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    for frame in frames {
        for sample in frame {
            writer.write_sample(*sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Writes a short constant-level mono file for each of the given names into `dir`.
pub fn write_sample_dir(dir: &Path, names: &[&str], frames: usize) -> Result<(), Box<dyn Error>> {
    let data: Vec<Vec<i16>> = (0..frames).map(|_| vec![i16::MAX / 2]).collect();
    for name in names {
        write_wav(&dir.join(name), &data, 44100)?;
    }
    Ok(())
}
