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
use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;
use crate::playback::{FadeLaw, OverlapStrategy, SameTrigger};
use crate::util;

const DEFAULT_FALLBACK_TIME: Duration = Duration::from_secs(300);
const DEFAULT_FADE_LENGTH: Duration = Duration::from_secs(20);

/// The overlap strategy as written in the configuration.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlapStrategyKind {
    #[default]
    Fadeout,
    Abort,
}

/// Playback behavior shared by every device.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// How long the player must be idle before a random clip plays (default: 5m).
    fallback_time: Option<String>,

    /// How long a superseded clip takes to fade out (default: 20s).
    fade_length: Option<String>,

    /// What to do with a request while a clip is playing (default: fadeout).
    overlap_strategy: Option<OverlapStrategyKind>,

    /// The gain law of the fade (default: linear).
    fade_law: Option<FadeLaw>,

    /// What to do with a request for the trigger that is already playing (default: restart).
    same_trigger: Option<SameTrigger>,
}

impl Playback {
    /// Returns the idle time before a fallback clip plays.
    pub fn fallback_time(&self) -> Result<Duration, ConfigError> {
        parse(self.fallback_time.as_deref(), DEFAULT_FALLBACK_TIME)
    }

    /// Returns the fade length.
    pub fn fade_length(&self) -> Result<Duration, ConfigError> {
        parse(self.fade_length.as_deref(), DEFAULT_FADE_LENGTH)
    }

    /// Resolves the overlap strategy, including its fade length.
    pub fn overlap_strategy(&self) -> Result<OverlapStrategy, ConfigError> {
        Ok(match self.overlap_strategy.unwrap_or_default() {
            OverlapStrategyKind::Fadeout => OverlapStrategy::Fadeout {
                length: self.fade_length()?,
            },
            OverlapStrategyKind::Abort => OverlapStrategy::Abort,
        })
    }

    pub fn fade_law(&self) -> FadeLaw {
        self.fade_law.unwrap_or_default()
    }

    pub fn same_trigger(&self) -> SameTrigger {
        self.same_trigger.unwrap_or_default()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_time()?.is_zero() {
            return Err(ConfigError::Invalid("fallback_time must be positive".into()));
        }
        self.overlap_strategy()?;
        Ok(())
    }
}

fn parse(value: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => util::parse_duration(value).map_err(|reason| ConfigError::Duration {
            value: value.to_string(),
            reason,
        }),
        None => Ok(default),
    }
}
