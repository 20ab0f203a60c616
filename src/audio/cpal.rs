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
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, warn, Level};

use super::thread_priority::{
    configure_render_thread_priority, render_thread_priority, rt_audio_enabled,
};
use crate::config;
use crate::playback::{DeviceChannel, PlaybackError};

/// A small wrapper around a cpal::Device that renders one device channel.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The output sample rate.
    sample_rate: u32,
    /// Frames per render block.
    block_size: usize,
    /// 1-indexed device channels that receive the clip. None means all of them.
    output_channels: Option<Vec<u16>>,
    /// Output stream errors seen so far.
    underruns: Arc<AtomicU64>,
    /// Cleared to stop the output thread.
    running: Arc<AtomicBool>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Renders mono blocks from the channel into an interleaved device buffer. The
/// callback may ask for more frames than a block holds, in which case several
/// blocks are rendered.
fn fill_interleaved<T>(
    channel: &mut DeviceChannel,
    block: &mut [f32],
    mask: &[bool],
    data: &mut [T],
) where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    // A trailing partial frame, if any, is left silent.
    data.fill(T::EQUILIBRIUM);
    let channels = mask.len();
    for chunk in data.chunks_mut(block.len() * channels) {
        let frames = chunk.len() / channels;
        if frames == 0 {
            break;
        }
        let mono = &mut block[..frames];
        channel.render(mono);
        for (frame, sample) in chunk.chunks_mut(channels).zip(mono.iter()) {
            for (out, enabled) in frame.iter_mut().zip(mask) {
                *out = T::from_sample(if *enabled { *sample } else { 0.0 });
            }
        }
    }
}

fn output_callback<T>(
    mut channel: DeviceChannel,
    block_size: usize,
    mask: Vec<bool>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut block = vec![0.0f32; block_size];
    let priority = render_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_render_thread_priority(priority, rt_audio, &mut priority_set);
        fill_interleaved(&mut channel, &mut block, &mask, data);
    }
}

/// Builds the per-channel mask from 1-indexed output channels.
fn channel_mask(
    max_channels: u16,
    output_channels: Option<&[u16]>,
) -> Result<Vec<bool>, Box<dyn Error>> {
    let Some(output_channels) = output_channels else {
        return Ok(vec![true; max_channels as usize]);
    };

    let mut mask = vec![false; max_channels as usize];
    for channel in output_channels {
        if *channel == 0 || *channel > max_channels {
            return Err(format!(
                "output channel {} is out of range, device has {} channels",
                channel, max_channels
            )
            .into());
        }
        mask[(*channel - 1) as usize] = true;
    }
    Ok(mask)
}

/// Returns true if any supported `(channels, min_rate, max_rate)` range covers the
/// channel count at the sample rate.
fn supports(ranges: &[(u16, u32, u32)], channels: u16, sample_rate: u32) -> bool {
    ranges
        .iter()
        .any(|(c, min, max)| *c == channels && (*min..=*max).contains(&sample_rate))
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
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
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate: 0,
                        block_size: 0,
                        output_channels: None,
                        underruns: Arc::new(AtomicU64::new(0)),
                        running: Arc::new(AtomicBool::new(false)),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets every cpal device whose name contains the configured filter.
    pub fn find(config: &config::Audio) -> Result<Vec<Device>, Box<dyn Error>> {
        let filter = config.device_filter();
        let mut devices = Vec::new();
        for mut device in Device::list_cpal_devices()?
            .into_iter()
            .filter(|device| device.name.contains(filter))
        {
            if let Some(output_channels) = config.output_channels() {
                channel_mask(device.max_channels, Some(output_channels))?;
            }
            let ranges = device
                .device
                .supported_output_configs()?
                .map(|range| {
                    (
                        range.channels(),
                        range.min_sample_rate().0,
                        range.max_sample_rate().0,
                    )
                })
                .collect::<Vec<_>>();
            if !supports(&ranges, device.max_channels, config.sample_rate()) {
                return Err(format!(
                    "{} does not support {} channels at {} Hz",
                    device.name,
                    device.max_channels,
                    config.sample_rate()
                )
                .into());
            }
            device.sample_rate = config.sample_rate();
            device.block_size = config.block_size();
            device.output_channels = config.output_channels().map(|c| c.to_vec());
            devices.push(device);
        }
        Ok(devices)
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, channel: DeviceChannel) -> Result<(), Box<dyn Error>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(format!("device {} already has a channel", self.name).into());
        }

        let mask = channel_mask(self.max_channels, self.output_channels.as_deref())?;
        let sample_format = self.device.default_output_config()?.sample_format();
        let config = cpal::StreamConfig {
            channels: self.max_channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.block_size as u32),
        };

        let device = self.device.clone();
        let name = self.name.clone();
        let block_size = self.block_size;
        let underruns = self.underruns.clone();
        let status = channel.status();
        let running = self.running.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        // The stream is created inside the thread that keeps it alive.
        thread::spawn(move || {
            let span = span!(Level::INFO, "output stream", device = %name);
            let _enter = span.enter();

            let error_callback = {
                let name = name.clone();
                move |err: cpal::StreamError| {
                    underruns.fetch_add(1, Ordering::Relaxed);
                    let count = status.record_underrun();
                    warn!(
                        err = %PlaybackError::DeviceUnderrun { device: name.clone() },
                        cause = %err,
                        count,
                        "Output stream error."
                    );
                }
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &config,
                    output_callback::<f32>(channel, block_size, mask),
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &config,
                    output_callback::<i16>(channel, block_size, mask),
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &config,
                    output_callback::<i32>(channel, block_size, mask),
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::U16 => device.build_output_stream(
                    &config,
                    output_callback::<u16>(channel, block_size, mask),
                    error_callback,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                    return;
                }
            };

            let stream = match stream_result {
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
            info!(
                format = ?sample_format,
                block_size,
                "Output stream started."
            );
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the device is dropped.
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                Err(format!("{}: {}", self.name, e).into())
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                Err(format!("{}: output thread exited", self.name).into())
            }
        }
    }

    fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
