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
use std::{error::Error, fmt, sync::Arc};

use tracing::info;

use crate::config;
use crate::playback::DeviceChannel;

pub mod cpal;
pub mod mock;
mod thread_priority;

/// An output device that renders a single [`DeviceChannel`].
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// The device name.
    fn name(&self) -> &str;

    /// Hands the channel to the device's render thread. From here on the device
    /// pulls one block at a time from the channel until it is dropped.
    fn attach(&self, channel: DeviceChannel) -> Result<(), Box<dyn Error>>;

    /// The number of times the device could not be fed in time.
    fn underruns(&self) -> u64;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets every device matching the configured filter, in name order.
pub fn find_devices(config: &config::Audio) -> Result<Vec<Arc<dyn Device>>, Box<dyn Error>> {
    let filter = config.device_filter();
    let devices: Vec<Arc<dyn Device>> = if config.is_mock() {
        (1..=config.mock_devices())
            .map(|i| {
                let device: Arc<dyn Device> = Arc::new(mock::Device::get(
                    &format!("{}-{}", filter, i),
                    config.sample_rate(),
                    config.block_size(),
                ));
                device
            })
            .collect()
    } else {
        cpal::Device::find(config)?
            .into_iter()
            .map(|device| {
                let device: Arc<dyn Device> = Arc::new(device);
                device
            })
            .collect()
    };

    if devices.is_empty() {
        return Err(format!("no output devices found matching {:?}", filter).into());
    }
    for device in devices.iter() {
        info!(device = %device, "Using output device.");
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_mock_devices() {
        let mut audio = config::Audio::new("mock");
        let devices = find_devices(&audio).unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["mock-1", "mock-2"]);

        audio = config::Audio::new("mock-speaker");
        let devices = find_devices(&audio).unwrap();
        assert_eq!(devices[0].name(), "mock-speaker-1");
        assert_eq!(devices[0].underruns(), 0);
    }
}
