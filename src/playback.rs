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
//! Playback concurrency and overlap resolution.
//!
//! This module provides:
//! - The controller state machine that decides what happens to every play request
//! - Per-device channels that render the controller's decisions block by block
//! - Fade laws for outgoing sessions
//! - The idle watchdog that requests fallback clips

mod channel;
mod controller;
mod error;
mod fade;
mod session;
mod strategy;
mod watchdog;

pub use channel::{
    device_channel, ChannelCommand, ChannelHandle, ChannelStatus, Cue, DeviceBank, DeviceChannel,
};
pub use controller::{
    ControllerStatus, Outcome, PlaybackController, PlaybackState, SameTrigger,
};
pub use error::PlaybackError;
pub use fade::FadeLaw;
pub use session::{PlayRequest, PlaybackSession, RequestOrigin};
pub use strategy::{Overlap, OverlapPolicy, OverlapStrategy};
pub use watchdog::IdleWatchdog;
