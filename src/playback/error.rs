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
use crate::clips::TriggerKey;

/// Errors raised by the playback core.
///
/// Only [`PlaybackError::EmptyLibrary`] is fatal, and only at startup. The others are
/// reported and the player keeps serving requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("no clips registered for trigger {0}")]
    UnknownTrigger(TriggerKey),

    #[error("clip library is empty: {0}")]
    EmptyLibrary(String),

    #[error("device {device} could not be fed in time")]
    DeviceUnderrun { device: String },
}
