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
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::channel::{ChannelCommand, Cue, DeviceBank};
use super::error::PlaybackError;
use super::session::{PlayRequest, PlaybackSession};
use super::strategy::{Overlap, OverlapPolicy, OverlapStrategy};
use super::watchdog::IdleWatchdog;
use crate::clips::ClipLibrary;

/// The state of the controller, derived from which sessions are active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing is playing.
    Idle,
    /// One session is playing at full gain.
    Playing,
    /// A session is playing and the previous one is fading out.
    Fadeout,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Fadeout => write!(f, "fadeout"),
        }
    }
}

/// What to do with a request for the trigger that is already playing.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SameTrigger {
    /// Treat it like any other overlapping request.
    #[default]
    Restart,
    /// Drop it.
    Ignore,
}

/// The result of an accepted or rejected request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A session started from silence.
    Started { session: u64 },
    /// A session started while the previous one began fading out.
    Crossfaded { session: u64, outgoing: u64 },
    /// The request was dropped and nothing changed.
    Rejected,
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Outcome::Rejected)
    }
}

/// A point-in-time view of the controller, for status reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: PlaybackState,
    pub current: Option<String>,
    pub outgoing: Option<String>,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(current) = &self.current {
            write!(f, ", current: {}", current)?;
        }
        if let Some(outgoing) = &self.outgoing {
            write!(f, ", outgoing: {}", outgoing)?;
        }
        Ok(())
    }
}

/// Decides, for every request, whether to start, reject or crossfade, and keeps
/// every device channel in step with that decision.
///
/// The controller is the sole owner of session state. It is driven from a single
/// task, so requests are processed one at a time.
pub struct PlaybackController {
    library: Arc<ClipLibrary>,
    policy: Box<dyn OverlapPolicy>,
    same_trigger: SameTrigger,
    watchdog: IdleWatchdog,
    bank: DeviceBank,
    rng: StdRng,
    current: Option<PlaybackSession>,
    outgoing: Option<PlaybackSession>,
}

impl PlaybackController {
    /// Creates a new idle controller. The idle timer starts at `now`.
    pub fn new(
        library: Arc<ClipLibrary>,
        strategy: OverlapStrategy,
        fallback_time: Duration,
        bank: DeviceBank,
        now: Instant,
    ) -> PlaybackController {
        PlaybackController {
            library,
            policy: strategy.into_policy(),
            same_trigger: SameTrigger::default(),
            watchdog: IdleWatchdog::new(fallback_time, now),
            bank,
            rng: StdRng::from_entropy(),
            current: None,
            outgoing: None,
        }
    }

    /// Uses a seeded random source, for reproducible clip selection.
    pub fn with_seed(mut self, seed: u64) -> PlaybackController {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_same_trigger(mut self, same_trigger: SameTrigger) -> PlaybackController {
        self.same_trigger = same_trigger;
        self
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.current, &self.outgoing) {
            (None, _) => PlaybackState::Idle,
            (Some(_), None) => PlaybackState::Playing,
            (Some(_), Some(_)) => PlaybackState::Fadeout,
        }
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn outgoing(&self) -> Option<&PlaybackSession> {
        self.outgoing.as_ref()
    }

    pub fn watchdog(&self) -> &IdleWatchdog {
        &self.watchdog
    }

    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    pub fn bank(&self) -> &DeviceBank {
        &self.bank
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state(),
            current: self.current.as_ref().map(|s| s.clip().to_string()),
            outgoing: self.outgoing.as_ref().map(|s| s.clip().to_string()),
        }
    }

    /// Processes a single play request.
    pub fn handle(
        &mut self,
        request: PlayRequest,
        now: Instant,
    ) -> Result<Outcome, PlaybackError> {
        self.advance(now);

        if !self.library.contains(&request.key) {
            warn!(key = %request.key, origin = %request.origin, "Unknown trigger.");
            return Err(PlaybackError::UnknownTrigger(request.key));
        }

        let outcome = match self.current.take() {
            None => self.start(request, now)?,
            Some(current) => {
                if self.same_trigger == SameTrigger::Ignore && current.key() == &request.key {
                    debug!(key = %request.key, "Trigger is already playing, ignoring.");
                    self.current = Some(current);
                    return Ok(Outcome::Rejected);
                }

                match self.policy.on_overlap() {
                    Overlap::Reject => {
                        debug!(
                            key = %request.key,
                            origin = %request.origin,
                            playing = %current,
                            "Rejected request while playing."
                        );
                        self.current = Some(current);
                        return Ok(Outcome::Rejected);
                    }
                    Overlap::Crossfade(length) => {
                        self.crossfade(current, request, length, now)?
                    }
                }
            }
        };

        self.watchdog.reset_on(outcome.is_accepted(), now);
        Ok(outcome)
    }

    /// Fires the idle fallback if it is due.
    pub fn tick(&mut self, now: Instant) -> Option<Result<Outcome, PlaybackError>> {
        self.advance(now);

        let state = self.state();
        let request = self
            .watchdog
            .tick(now, state, &self.library, &mut self.rng)?;
        info!(key = %request.key, "Playing fallback clip.");
        Some(self.handle(request, now))
    }

    /// Retires sessions that have run their course by `now`.
    pub fn advance(&mut self, now: Instant) {
        if let Some(outgoing) = &self.outgoing {
            if outgoing.is_faded_out(now, self.policy.fade_length()) || outgoing.is_finished(now) {
                debug!(session = %outgoing, "Outgoing clip faded out.");
                self.outgoing = None;
            }
        }

        if let Some(current) = &self.current {
            if current.is_finished(now) {
                let ended_at = current.ends_at().min(now);
                info!(session = %current, "Clip finished.");
                self.current = None;
                if let Some(outgoing) = self.outgoing.take() {
                    debug!(session = %outgoing, "Dropping outgoing clip.");
                }
                self.watchdog.rearm(ended_at);
            }
        }
    }

    fn start(&mut self, request: PlayRequest, now: Instant) -> Result<Outcome, PlaybackError> {
        let clip = self.library.pick_clip(&request.key, &mut self.rng)?;
        let session = PlaybackSession::new(request.key, clip, now);

        self.bank.broadcast(&ChannelCommand::Start(Cue::from(&session)));
        info!(
            session = %session,
            origin = %request.origin,
            devices = self.bank.len(),
            "Started clip."
        );

        let outcome = Outcome::Started {
            session: session.id(),
        };
        self.current = Some(session);
        Ok(outcome)
    }

    fn crossfade(
        &mut self,
        mut previous: PlaybackSession,
        request: PlayRequest,
        length: Duration,
        now: Instant,
    ) -> Result<Outcome, PlaybackError> {
        let clip = match self.library.pick_clip(&request.key, &mut self.rng) {
            Ok(clip) => clip,
            Err(e) => {
                self.current = Some(previous);
                return Err(e);
            }
        };
        let session = PlaybackSession::new(request.key, clip, now);

        if let Some(cut) = self.outgoing.take() {
            debug!(session = %cut, "Cutting outgoing clip.");
        }
        previous.begin_fade(now);

        self.bank.broadcast(&ChannelCommand::Crossfade {
            incoming: Cue::from(&session),
            fade_started_at: now,
            fade_length: length,
        });
        info!(
            session = %session,
            outgoing = %previous,
            origin = %request.origin,
            fade_secs = length.as_secs_f64(),
            "Crossfading to clip."
        );

        let outcome = Outcome::Crossfaded {
            session: session.id(),
            outgoing: previous.id(),
        };
        self.outgoing = Some(previous);
        self.current = Some(session);
        Ok(outcome)
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("devices", &self.bank.len())
            .finish()
    }
}
