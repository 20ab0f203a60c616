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

//! The monotonic time source shared by the controller, the idle watchdog and
//! every device channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A monotonic clock. Every timing decision in the player goes through one of these.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The process clock, backed by [`Instant`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Used to drive the state machine through
/// timed scenarios deterministically.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a new manual clock pinned at its origin.
    pub fn new() -> ManualClock {
        ManualClock {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Returns the instant the clock started at.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Returns the instant `secs` seconds after the origin.
    pub fn at(&self, secs: f64) -> Instant {
        self.origin + Duration::from_secs_f64(secs)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Moves the clock to `secs` seconds after the origin. Never moves backwards.
    pub fn set(&self, secs: f64) {
        let mut offset = self.offset.lock();
        let target = Duration::from_secs_f64(secs);
        if target > *offset {
            *offset = target;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Convenience for sharing a clock between the control path and render threads.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.origin());

        clock.set(10.0);
        assert_eq!(clock.now(), clock.at(10.0));

        // Setting an earlier time is ignored.
        clock.set(5.0);
        assert_eq!(clock.now(), clock.at(10.0));

        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), clock.at(10.5));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.set(3.0);
        assert_eq!(other.now(), clock.at(3.0));
    }
}
