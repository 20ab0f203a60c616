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
use std::path::Path;

use config::{Config, Environment, File, FileFormat, Source};
use serde::Deserialize;

use super::audio::Audio;
use super::clips::Clips;
use super::error::ConfigError;
use super::playback::Playback;
use super::trigger::Trigger;

/// Environment variables with this prefix override file values, e.g.
/// `CLIPPLAYER__PLAYBACK__FALLBACK_TIME=10m`.
pub const ENV_PREFIX: &str = "CLIPPLAYER";

/// The configuration for the clip player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// Where clips are loaded from.
    clips: Clips,
    /// The output devices.
    audio: Audio,
    /// Overlap and idle behavior.
    #[serde(default)]
    playback: Playback,
    /// Where triggers come from (default: keyboard).
    #[serde(default)]
    triggers: Trigger,
}

impl Player {
    pub fn new(clips: Clips, audio: Audio, playback: Playback, triggers: Trigger) -> Player {
        Player {
            clips,
            audio,
            playback,
            triggers,
        }
    }

    /// Parse the player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Self::build(File::from(path).format(FileFormat::Yaml))
    }

    /// Parse the player configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Player, ConfigError> {
        Self::build(File::from_str(yaml, FileFormat::Yaml))
    }

    fn build<S>(source: S) -> Result<Player, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let player = Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Player>()?;
        player.validate()?;
        Ok(player)
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.playback.validate()?;
        self.triggers.validate()
    }

    pub fn clips(&self) -> &Clips {
        &self.clips
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn triggers(&self) -> &Trigger {
        &self.triggers
    }
}
