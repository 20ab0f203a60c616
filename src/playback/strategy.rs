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

/// How a request is handled while something is already playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapStrategy {
    /// The playing clip fades out over `length` while the new one starts.
    Fadeout { length: Duration },
    /// The request is ignored until playback finishes.
    Abort,
}

impl OverlapStrategy {
    /// Resolves the strategy into the policy object the controller consults.
    pub fn into_policy(self) -> Box<dyn OverlapPolicy> {
        match self {
            OverlapStrategy::Fadeout { length } => Box::new(FadeoutPolicy { length }),
            OverlapStrategy::Abort => Box::new(AbortPolicy),
        }
    }
}

impl fmt::Display for OverlapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapStrategy::Fadeout { length } => {
                write!(f, "fadeout ({:.1}s)", length.as_secs_f64())
            }
            OverlapStrategy::Abort => write!(f, "abort"),
        }
    }
}

/// The outcome of a request that arrives while a session is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overlap {
    /// Leave the active sessions alone and drop the request.
    Reject,
    /// Fade the current session out over the given length and start the new one.
    Crossfade(Duration),
}

/// Decides what happens to a request that overlaps an active session.
pub trait OverlapPolicy: fmt::Debug + Send + Sync {
    fn on_overlap(&self) -> Overlap;

    /// How long an outgoing session keeps sounding. Zero if this policy never fades.
    fn fade_length(&self) -> Duration;
}

#[derive(Debug)]
pub struct AbortPolicy;

impl OverlapPolicy for AbortPolicy {
    fn on_overlap(&self) -> Overlap {
        Overlap::Reject
    }

    fn fade_length(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug)]
pub struct FadeoutPolicy {
    length: Duration,
}

impl OverlapPolicy for FadeoutPolicy {
    fn on_overlap(&self) -> Overlap {
        Overlap::Crossfade(self.length)
    }

    fn fade_length(&self) -> Duration {
        self.length
    }
}
