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
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use super::controller::PlaybackState;
use super::session::PlayRequest;
use crate::clips::ClipLibrary;

/// Emits a fallback request once the player has been idle for long enough.
#[derive(Debug)]
pub struct IdleWatchdog {
    /// How long the player must sit idle before a fallback fires.
    fallback_time: Duration,
    /// The instant the idle timer was last started.
    armed_at: Instant,
}

impl IdleWatchdog {
    pub fn new(fallback_time: Duration, now: Instant) -> IdleWatchdog {
        IdleWatchdog {
            fallback_time,
            armed_at: now,
        }
    }

    pub fn fallback_time(&self) -> Duration {
        self.fallback_time
    }

    /// The instant a fallback becomes due, assuming the player stays idle.
    pub fn due_at(&self) -> Instant {
        self.armed_at + self.fallback_time
    }

    /// Restarts the idle timer.
    pub fn rearm(&mut self, now: Instant) {
        self.armed_at = now;
    }

    /// Restarts the idle timer if the request was accepted. Rejected and unknown
    /// requests leave it running.
    pub fn reset_on(&mut self, accepted: bool, now: Instant) {
        if accepted {
            self.rearm(now);
        }
    }

    /// Returns a fallback request if the player is idle and the timer has expired.
    /// The timer is restarted whenever a request is returned.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: Instant,
        state: PlaybackState,
        library: &ClipLibrary,
        rng: &mut R,
    ) -> Option<PlayRequest> {
        if state != PlaybackState::Idle {
            return None;
        }
        if now.saturating_duration_since(self.armed_at) < self.fallback_time {
            return None;
        }

        let key = library.random_key(rng);
        debug!(key = %key, "Idle timeout expired, requesting fallback.");
        self.rearm(now);
        Some(PlayRequest::fallback(key, now))
    }
}
