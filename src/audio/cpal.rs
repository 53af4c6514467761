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
    error::Error,
    fmt,
    sync::{mpsc, Arc},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::{mixer::Mixer, thread_priority, Gains, VoiceSource, Volume};

/// The name that selects the default output device of the default host.
const DEFAULT_DEVICE: &str = "default";

/// A cpal output device with a mixer running in its callback.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    channels: u16,
    /// Hands new voices to the audio thread.
    sources: crossbeam_channel::Sender<VoiceSource>,
    gains: Arc<Gains>,
    /// Dropping or signalling this stops the stream.
    shutdown: Option<mpsc::Sender<()>>,
    /// The thread that owns the cpal stream.
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists the output devices of every available host.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = configs.map(|c| c.channels()).max().unwrap_or(0);
                if max_channels > 0 {
                    devices.push(format!(
                        "{} (Channels={}) ({})",
                        device.name()?,
                        max_channels,
                        host_id.name()
                    ));
                }
            }
        }

        devices.sort();
        Ok(devices)
    }

    fn find(name: &str) -> Result<(cpal::HostId, cpal::Device), Box<dyn Error>> {
        if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            return Ok((host.id(), device));
        }

        for host_id in cpal::available_hosts() {
            let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
                continue;
            };
            for device in devices {
                if device.name().is_ok_and(|n| n.trim() == name) {
                    return Ok((host_id, device));
                }
            }
        }
        Err(format!("no device found with name {}", name).into())
    }

    /// Opens the named output device (or `default`) and starts its stream.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let (host_id, device) = Device::find(name)?;
        let name = device.name()?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config = supported.config();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        let (sources, receiver) = crossbeam_channel::unbounded();
        let gains = Arc::new(Gains::default());
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        // cpal streams aren't Send, so the stream lives and dies on its own thread.
        let mixer = Mixer::new(receiver, channels, sample_rate, gains.clone());
        let stream_thread = thread::Builder::new()
            .name("pulsepad-audio".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "audio output (cpal)");
                let _enter = span.enter();

                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer),
                    cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer),
                    cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer),
                    cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer),
                    other => {
                        let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                        return;
                    }
                };
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to create stream: {}", e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(format!("failed to start stream: {}", e)));
                    return;
                }

                info!(sample_rate, channels, "CPAL output stream started");
                let _ = ready_tx.send(Ok(()));

                // Either a signal or the sender being dropped ends the stream.
                let _ = shutdown_rx.recv();
                info!("CPAL output stream stopped");
            })?;

        ready_rx.recv()??;

        Ok(Device {
            name,
            host_id,
            channels,
            sources,
            gains,
            shutdown: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = thread_priority::callback_thread_priority();
    let rt_audio = thread_priority::rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            thread_priority::configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

            if scratch.len() != data.len() {
                scratch.resize(data.len(), 0.0);
            }
            mixer.mix(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

impl super::Device for Device {
    fn play(&self, source: VoiceSource) -> Result<(), Box<dyn Error>> {
        self.sources.send(source)?;
        Ok(())
    }

    fn set_volume(&self, volume: Volume, gain: f32) {
        info!(volume = %volume, gain, "Volume changed");
        self.gains.set(volume, gain);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.join();
        }
    }
}
