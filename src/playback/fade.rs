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

//! Fade-out gain envelopes for outgoing sessions.

use std::time::Duration;

use serde::Deserialize;

/// The gain law used when an outgoing session is faded to silence.
///
/// Every law satisfies the same contract: full gain at the start of the fade,
/// silence at (and after) the fade length, never increasing in between.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FadeLaw {
    /// Gain falls linearly from 1.0 to 0.0.
    #[default]
    Linear,
    /// Square-root law, keeps more of the outgoing clip audible early in the fade.
    EqualPower,
}

impl FadeLaw {
    /// Returns the gain for a fade that has been running for `elapsed` out of `length`.
    pub fn gain(self, elapsed: Duration, length: Duration) -> f32 {
        self.gain_secs(elapsed.as_secs_f64(), length.as_secs_f64())
    }

    /// Same as [`FadeLaw::gain`], in seconds. This is what the render path calls per sample.
    #[inline]
    pub fn gain_secs(self, elapsed: f64, length: f64) -> f32 {
        // A zero-length fade is a hard cut.
        if length <= 0.0 || elapsed >= length {
            return 0.0;
        }
        if elapsed <= 0.0 {
            return 1.0;
        }

        let remaining = 1.0 - elapsed / length;
        let gain = match self {
            FadeLaw::Linear => remaining,
            FadeLaw::EqualPower => remaining.sqrt(),
        };
        gain.clamp(0.0, 1.0) as f32
    }
}
