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
//! A trigger-driven clip player for unattended installations.
//!
//! Physical triggers request a clip for a key, the playback controller decides
//! whether to start it, drop it or crossfade into it, and every configured output
//! device renders the same clip in step. An idle watchdog plays a random clip when
//! nobody has triggered anything for a while.

pub mod audio;
pub mod clips;
pub mod clock;
pub mod config;
pub mod playback;
pub mod player;
pub mod trigger;
pub mod util;

#[cfg(test)]
mod testutil;
