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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clips::{Clip, TriggerKey};

/// Global session ID counter.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Where a play request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOrigin {
    /// A physical trigger was pressed.
    Trigger,
    /// The idle watchdog fired.
    Fallback,
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOrigin::Trigger => write!(f, "trigger"),
            RequestOrigin::Fallback => write!(f, "fallback"),
        }
    }
}

/// A request to play a clip for a trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayRequest {
    pub key: TriggerKey,
    pub timestamp: Instant,
    pub origin: RequestOrigin,
}

impl PlayRequest {
    /// A request from a physical trigger.
    pub fn trigger(key: impl Into<TriggerKey>, timestamp: Instant) -> PlayRequest {
        PlayRequest {
            key: key.into(),
            timestamp,
            origin: RequestOrigin::Trigger,
        }
    }

    /// A synthetic request from the idle watchdog.
    pub fn fallback(key: TriggerKey, timestamp: Instant) -> PlayRequest {
        PlayRequest {
            key,
            timestamp,
            origin: RequestOrigin::Fallback,
        }
    }
}

/// One in-flight performance of a clip.
#[derive(Clone)]
pub struct PlaybackSession {
    /// Unique ID for this session.
    id: u64,
    /// The trigger that started this session.
    key: TriggerKey,
    /// The clip being played.
    clip: Arc<Clip>,
    /// When this session started.
    started_at: Instant,
    /// When this session started fading out, if it has been superseded.
    fade_started_at: Option<Instant>,
}

impl PlaybackSession {
    /// Starts a new session at the given instant.
    pub fn new(key: TriggerKey, clip: Arc<Clip>, started_at: Instant) -> PlaybackSession {
        PlaybackSession {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst),
            key,
            clip,
            started_at,
            fade_started_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &TriggerKey {
        &self.key
    }

    pub fn clip(&self) -> &Arc<Clip> {
        &self.clip
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn fade_started_at(&self) -> Option<Instant> {
        self.fade_started_at
    }

    /// Marks this session as outgoing from the given instant.
    pub(crate) fn begin_fade(&mut self, at: Instant) {
        self.fade_started_at = Some(at);
    }

    /// The instant the clip runs out on its own.
    pub fn ends_at(&self) -> Instant {
        self.started_at + self.clip.duration()
    }

    /// Returns true once the clip has played to its end.
    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.clip.duration()
    }

    /// Returns true once a fade of the given length has run its course.
    /// A session that is not fading is never faded out.
    pub fn is_faded_out(&self, now: Instant, fade_length: Duration) -> bool {
        match self.fade_started_at {
            Some(at) => now.saturating_duration_since(at) >= fade_length,
            None => false,
        }
    }
}

impl fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.clip)
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("clip", &self.clip.name())
            .field("fading", &self.fade_started_at.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_session_lifetime() {
        let clock = ManualClock::new();
        let clip = Arc::new(Clip::new("hakka", "1.wav", vec![0.0; 30], 1));
        let mut session = PlaybackSession::new("hakka".into(), clip, clock.at(0.0));
        let other = PlaybackSession::new("hakka".into(), session.clip().clone(), clock.at(0.0));
        assert_ne!(session.id(), other.id());

        assert!(!session.is_finished(clock.at(29.9)));
        assert!(session.is_finished(clock.at(30.0)));
        assert_eq!(session.ends_at(), clock.at(30.0));

        let fade = Duration::from_secs(20);
        assert!(!session.is_faded_out(clock.at(100.0), fade));
        session.begin_fade(clock.at(10.0));
        assert!(!session.is_faded_out(clock.at(29.0), fade));
        assert!(session.is_faded_out(clock.at(30.0), fade));
    }
}
