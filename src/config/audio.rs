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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BLOCK_SIZE: usize = 1024;
const DEFAULT_MOCK_DEVICES: usize = 2;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// Every output device whose name contains this string is used.
    /// A filter starting with "mock" selects mock devices.
    device_filter: String,

    /// How many mock devices to create (default: 2).
    mock_devices: Option<usize>,

    /// Target sample rate in Hz (default: 48000). Clips are resampled to it on load.
    sample_rate: Option<u32>,

    /// Frames rendered per block (default: 1024).
    block_size: Option<usize>,

    /// 1-indexed device channels that receive the clip (default: all of them).
    output_channels: Option<Vec<u16>>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device_filter: &str) -> Audio {
        Audio {
            device_filter: device_filter.to_string(),
            mock_devices: None,
            sample_rate: None,
            block_size: None,
            output_channels: None,
        }
    }

    /// Returns the device name filter.
    pub fn device_filter(&self) -> &str {
        &self.device_filter
    }

    /// Returns true if mock devices should be used instead of real hardware.
    pub fn is_mock(&self) -> bool {
        self.device_filter.starts_with("mock")
    }

    /// Returns the number of mock devices (default: 2).
    pub fn mock_devices(&self) -> usize {
        self.mock_devices.unwrap_or(DEFAULT_MOCK_DEVICES)
    }

    /// Returns the target sample rate (default: 48000).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the render block size in frames (default: 1024).
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the output channels, or None for all of them.
    pub fn output_channels(&self) -> Option<&[u16]> {
        self.output_channels.as_deref()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.block_size() == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".into()));
        }
        if self.is_mock() && self.mock_devices() == 0 {
            return Err(ConfigError::Invalid("mock_devices must be positive".into()));
        }
        if let Some(channels) = &self.output_channels {
            if channels.is_empty() || channels.contains(&0) {
                return Err(ConfigError::Invalid(
                    "output_channels must list 1-indexed channels".into(),
                ));
            }
        }
        Ok(())
    }
}
