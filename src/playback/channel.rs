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

//! Per-device playback state.
//!
//! The controller owns a [`DeviceBank`] of [`ChannelHandle`]s. Each handle feeds a
//! [`DeviceChannel`] that lives on its device's render thread and is only ever
//! touched from there. Commands are drained at the top of every block, so the
//! render thread never blocks on the control path.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use super::fade::FadeLaw;
use super::session::PlaybackSession;
use crate::clips::Clip;
use crate::clock::SharedClock;

/// What a channel needs to know to play a session.
#[derive(Clone)]
pub struct Cue {
    pub session_id: u64,
    pub clip: Arc<Clip>,
}

impl From<&PlaybackSession> for Cue {
    fn from(session: &PlaybackSession) -> Self {
        Cue {
            session_id: session.id(),
            clip: session.clip().clone(),
        }
    }
}

/// A decision from the controller, applied to every channel in the bank.
#[derive(Clone)]
pub enum ChannelCommand {
    /// Play from silence. Anything still sounding is cut.
    Start(Cue),
    /// The current session becomes the outgoing one and fades out while `incoming`
    /// starts at full gain. A previous outgoing session is cut.
    Crossfade {
        incoming: Cue,
        fade_started_at: Instant,
        fade_length: Duration,
    },
    /// Silence the channel.
    Stop,
}

/// Read-only view of a channel's state, updated by the render thread.
#[derive(Default)]
pub struct ChannelStatus {
    current: AtomicU64,
    outgoing: AtomicU64,
    blocks: AtomicU64,
    underruns: AtomicU64,
    peak: AtomicU32,
}

impl ChannelStatus {
    /// The session currently sounding at full gain, if any.
    pub fn current_session(&self) -> Option<u64> {
        non_zero(self.current.load(Ordering::Relaxed))
    }

    /// The session currently fading out, if any.
    pub fn outgoing_session(&self) -> Option<u64> {
        non_zero(self.outgoing.load(Ordering::Relaxed))
    }

    /// Number of blocks rendered so far.
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Number of times the sink could not be fed in time.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Records a sink underrun.
    pub fn record_underrun(&self) -> u64 {
        self.underruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The loudest absolute sample rendered so far.
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }
}

fn non_zero(id: u64) -> Option<u64> {
    if id == 0 {
        None
    } else {
        Some(id)
    }
}

/// A session as seen by one channel: the clip and how far into it we are.
struct PlayHead {
    session_id: u64,
    clip: Arc<Clip>,
    position: usize,
}

impl PlayHead {
    fn new(cue: Cue) -> PlayHead {
        PlayHead {
            session_id: cue.session_id,
            clip: cue.clip,
            position: 0,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.position >= self.clip.frames()
    }
}

struct Outgoing {
    head: PlayHead,
    fade_started_at: Instant,
    fade_length: Duration,
}

/// Playback state for a single output device.
pub struct DeviceChannel {
    name: String,
    commands: Receiver<ChannelCommand>,
    clock: SharedClock,
    sample_rate: u32,
    fade_law: FadeLaw,
    current: Option<PlayHead>,
    outgoing: Option<Outgoing>,
    status: Arc<ChannelStatus>,
}

impl DeviceChannel {
    /// The name of the device this channel renders for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared status, for the device that owns this channel.
    pub fn status(&self) -> Arc<ChannelStatus> {
        self.status.clone()
    }

    /// Returns true if anything is sounding.
    pub fn is_active(&self) -> bool {
        self.current.is_some() || self.outgoing.is_some()
    }

    /// Renders one mono block. `out` is overwritten.
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_commands();

        out.fill(0.0);
        let now = self.clock.now();

        if let Some(current) = self.current.as_mut() {
            let samples = &current.clip.samples()[current.position.min(current.clip.frames())..];
            let n = samples.len().min(out.len());
            for (sample, source) in out[..n].iter_mut().zip(samples) {
                *sample += *source;
            }
            current.position += n;
        }

        if let Some(outgoing) = self.outgoing.as_mut() {
            let head = &mut outgoing.head;
            let samples = &head.clip.samples()[head.position.min(head.clip.frames())..];
            let n = samples.len().min(out.len());
            let length = outgoing.fade_length.as_secs_f64();
            let elapsed = now
                .saturating_duration_since(outgoing.fade_started_at)
                .as_secs_f64();
            let step = 1.0 / self.sample_rate as f64;

            for (i, (sample, source)) in out[..n].iter_mut().zip(samples).enumerate() {
                *sample += *source * self.fade_law.gain_secs(elapsed + i as f64 * step, length);
            }
            head.position += n;

            if head.is_exhausted() || elapsed + out.len() as f64 * step >= length {
                self.outgoing = None;
            }
        }

        if self.current.as_ref().is_some_and(PlayHead::is_exhausted) {
            self.current = None;
            self.outgoing = None;
        }

        let mut peak = 0.0f32;
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
            peak = peak.max(sample.abs());
        }

        self.publish(peak);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Start(cue) => {
                self.outgoing = None;
                self.current = Some(PlayHead::new(cue));
            }
            ChannelCommand::Crossfade {
                incoming,
                fade_started_at,
                fade_length,
            } => {
                // The channel may have already run the old clip out; in that case there
                // is nothing to fade and this is a plain start.
                self.outgoing = self.current.take().map(|head| Outgoing {
                    head,
                    fade_started_at,
                    fade_length,
                });
                self.current = Some(PlayHead::new(incoming));
            }
            ChannelCommand::Stop => {
                self.current = None;
                self.outgoing = None;
            }
        }
    }

    fn publish(&self, peak: f32) {
        let status = &self.status;
        status.current.store(
            self.current.as_ref().map_or(0, |head| head.session_id),
            Ordering::Relaxed,
        );
        status.outgoing.store(
            self.outgoing.as_ref().map_or(0, |o| o.head.session_id),
            Ordering::Relaxed,
        );
        status.blocks.fetch_add(1, Ordering::Relaxed);
        // Non-negative floats order the same way as their bit patterns.
        status.peak.fetch_max(peak.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("current", &self.current.as_ref().map(|h| h.session_id))
            .field("outgoing", &self.outgoing.as_ref().map(|o| o.head.session_id))
            .finish()
    }
}

/// The controller's end of a [`DeviceChannel`].
pub struct ChannelHandle {
    name: String,
    commands: Sender<ChannelCommand>,
    status: Arc<ChannelStatus>,
}

impl ChannelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &ChannelStatus {
        &self.status
    }

    /// Sends a command to the render thread. Returns false if the channel is gone.
    pub fn send(&self, command: ChannelCommand) -> bool {
        if self.commands.send(command).is_err() {
            warn!(device = self.name, "Device channel has gone away.");
            return false;
        }
        true
    }
}

/// Creates a channel for one output device.
pub fn device_channel(
    name: impl Into<String>,
    clock: SharedClock,
    sample_rate: u32,
    fade_law: FadeLaw,
) -> (ChannelHandle, DeviceChannel) {
    let name = name.into();
    let (tx, rx) = crossbeam_channel::unbounded();
    let status = Arc::new(ChannelStatus::default());

    (
        ChannelHandle {
            name: name.clone(),
            commands: tx,
            status: status.clone(),
        },
        DeviceChannel {
            name,
            commands: rx,
            clock,
            sample_rate,
            fade_law,
            current: None,
            outgoing: None,
            status,
        },
    )
}

/// The fixed set of device channels driven by the controller, created once at startup.
pub struct DeviceBank {
    channels: Box<[ChannelHandle]>,
}

impl DeviceBank {
    pub fn new(channels: Vec<ChannelHandle>) -> DeviceBank {
        DeviceBank {
            channels: channels.into_boxed_slice(),
        }
    }

    /// Sends the same command to every channel so all devices mirror one decision.
    pub fn broadcast(&self, command: &ChannelCommand) {
        for channel in self.channels.iter() {
            channel.send(command.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelHandle> {
        self.channels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const RATE: u32 = 100;

    fn constant_clip(key: &str, value: f32, secs: usize) -> Arc<Clip> {
        Arc::new(Clip::new(
            key,
            format!("{}.wav", key),
            vec![value; RATE as usize * secs],
            RATE,
        ))
    }

    fn cue(id: u64, clip: &Arc<Clip>) -> Cue {
        Cue {
            session_id: id,
            clip: clip.clone(),
        }
    }

    fn channel(clock: &ManualClock) -> (ChannelHandle, DeviceChannel) {
        device_channel("test", Arc::new(clock.clone()), RATE, FadeLaw::Linear)
    }

    #[test]
    fn test_silence_when_idle() {
        let clock = ManualClock::new();
        let (_handle, mut channel) = channel(&clock);
        let mut block = [1.0f32; 10];
        channel.render(&mut block);
        assert!(block.iter().all(|s| *s == 0.0));
        assert!(!channel.is_active());
        assert_eq!(channel.status().blocks_rendered(), 1);
    }

    #[test]
    fn test_start_plays_at_full_gain_and_ends() {
        let clock = ManualClock::new();
        let (handle, mut channel) = channel(&clock);
        let clip = constant_clip("a", 0.5, 1);

        handle.send(ChannelCommand::Start(cue(1, &clip)));
        let mut block = [0.0f32; 60];
        channel.render(&mut block);
        assert!(block.iter().all(|s| *s == 0.5));
        assert_eq!(handle.status().current_session(), Some(1));

        // 40 frames remain, the rest of the block is silence.
        channel.render(&mut block);
        assert!(block[..40].iter().all(|s| *s == 0.5));
        assert!(block[40..].iter().all(|s| *s == 0.0));
        assert_eq!(handle.status().current_session(), None);
        assert!(!channel.is_active());
    }

    #[test]
    fn test_crossfade_attenuates_only_outgoing() {
        let clock = ManualClock::new();
        let (handle, mut channel) = channel(&clock);
        let a = constant_clip("a", 0.4, 30);
        let b = constant_clip("b", 0.2, 30);

        handle.send(ChannelCommand::Start(cue(1, &a)));
        let mut block = [0.0f32; 100];
        channel.render(&mut block);

        clock.set(10.0);
        handle.send(ChannelCommand::Crossfade {
            incoming: cue(2, &b),
            fade_started_at: clock.at(10.0),
            fade_length: Duration::from_secs(20),
        });
        channel.render(&mut block);
        // First sample: a at gain 1.0 plus b at full gain.
        assert!((block[0] - 0.6).abs() < 1e-6);
        assert!(block[99] < block[0]);
        assert_eq!(handle.status().current_session(), Some(2));
        assert_eq!(handle.status().outgoing_session(), Some(1));

        // Halfway through the fade the outgoing clip is at half gain.
        clock.set(20.0);
        channel.render(&mut block);
        assert!((block[0] - (0.2 + 0.4 * 0.5)).abs() < 1e-4);

        // Once the fade completes only the incoming clip remains.
        clock.set(29.99);
        channel.render(&mut block);
        assert_eq!(handle.status().outgoing_session(), None);
        clock.set(30.0);
        channel.render(&mut block);
        assert!(block.iter().all(|s| (*s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_third_request_cuts_previous_outgoing() {
        let clock = ManualClock::new();
        let (handle, mut channel) = channel(&clock);
        let a = constant_clip("a", 0.1, 30);
        let b = constant_clip("b", 0.2, 30);
        let c = constant_clip("c", 0.3, 30);
        let fade = Duration::from_secs(20);

        handle.send(ChannelCommand::Start(cue(1, &a)));
        handle.send(ChannelCommand::Crossfade {
            incoming: cue(2, &b),
            fade_started_at: clock.at(0.0),
            fade_length: fade,
        });
        handle.send(ChannelCommand::Crossfade {
            incoming: cue(3, &c),
            fade_started_at: clock.at(0.0),
            fade_length: fade,
        });
        let mut block = [0.0f32; 1];
        channel.render(&mut block);

        assert_eq!(handle.status().current_session(), Some(3));
        assert_eq!(handle.status().outgoing_session(), Some(2));
        // Only c and b are audible, a was cut.
        assert!((block[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let clock = ManualClock::new();
        let (handle, mut channel) = channel(&clock);
        let loud = constant_clip("loud", 0.9, 5);

        handle.send(ChannelCommand::Start(cue(1, &loud)));
        handle.send(ChannelCommand::Crossfade {
            incoming: cue(2, &loud),
            fade_started_at: clock.at(0.0),
            fade_length: Duration::from_secs(5),
        });
        let mut block = [0.0f32; 10];
        channel.render(&mut block);
        assert!(block.iter().all(|s| *s == 1.0));
        assert_eq!(handle.status().peak(), 1.0);
    }

    #[test]
    fn test_current_ending_drops_outgoing() {
        let clock = ManualClock::new();
        let (handle, mut channel) = channel(&clock);
        let long = constant_clip("long", 0.1, 30);
        let short = constant_clip("short", 0.2, 1);

        handle.send(ChannelCommand::Start(cue(1, &long)));
        handle.send(ChannelCommand::Crossfade {
            incoming: cue(2, &short),
            fade_started_at: clock.at(0.0),
            fade_length: Duration::from_secs(20),
        });
        let mut block = [0.0f32; 100];
        channel.render(&mut block);
        assert!(!channel.is_active());
        assert_eq!(handle.status().outgoing_session(), None);

        channel.render(&mut block);
        assert!(block.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_stop_and_bank_broadcast() {
        let clock = ManualClock::new();
        let (h1, mut c1) = channel(&clock);
        let (h2, mut c2) = channel(&clock);
        let bank = DeviceBank::new(vec![h1, h2]);
        assert_eq!(bank.len(), 2);
        let clip = constant_clip("a", 0.3, 2);

        bank.broadcast(&ChannelCommand::Start(cue(9, &clip)));
        let mut block = [0.0f32; 4];
        c1.render(&mut block);
        c2.render(&mut block);
        assert!(bank.iter().all(|h| h.status().current_session() == Some(9)));

        bank.broadcast(&ChannelCommand::Stop);
        c1.render(&mut block);
        c2.render(&mut block);
        assert!(bank.iter().all(|h| h.status().current_session().is_none()));
        assert!(block.iter().all(|s| *s == 0.0));
    }
}
