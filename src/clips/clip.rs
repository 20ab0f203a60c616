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
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::util;

/// Identifies a physical trigger, e.g. the button for one language.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TriggerKey(String);

impl TriggerKey {
    pub fn new(key: impl Into<String>) -> TriggerKey {
        TriggerKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TriggerKey {
    fn from(key: &str) -> Self {
        TriggerKey::new(key)
    }
}

impl From<String> for TriggerKey {
    fn from(key: String) -> Self {
        TriggerKey(key)
    }
}

/// A decoded mono clip, loaded once at startup and shared read-only afterwards.
pub struct Clip {
    /// The trigger this clip belongs to.
    key: TriggerKey,
    /// The file name the clip was loaded from.
    name: String,
    /// Mono samples in [-1.0, 1.0].
    samples: Vec<f32>,
    /// Sample rate of the samples.
    sample_rate: u32,
}

impl Clip {
    /// Creates a new clip from mono samples.
    pub fn new(
        key: impl Into<TriggerKey>,
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: u32,
    ) -> Clip {
        Clip {
            key: key.into(),
            name: name.into(),
            samples,
            sample_rate,
        }
    }

    pub fn key(&self) -> &TriggerKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of mono frames in the clip.
    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    /// The playing time of the clip.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.key,
            self.name,
            util::duration_minutes_seconds(self.duration())
        )
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("frames", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_duration() {
        let clip = Clip::new("kurdish", "a.wav", vec![0.0; 48000 * 3], 48000);
        assert_eq!(clip.duration(), Duration::from_secs(3));
        assert_eq!(clip.frames(), 144000);
        assert_eq!(clip.to_string(), "kurdish/a.wav (0:03)");

        let empty = Clip::new("kurdish", "b.wav", vec![], 0);
        assert_eq!(empty.duration(), Duration::ZERO);
    }
}
