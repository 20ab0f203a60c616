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
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{Clip, TriggerKey};
use crate::playback::PlaybackError;

/// Maps every trigger to the clips it can play.
pub struct ClipLibrary {
    /// Clips by trigger, each list sorted by file name.
    clips: BTreeMap<TriggerKey, Vec<Arc<Clip>>>,
    /// All known triggers, in key order.
    keys: Vec<TriggerKey>,
}

impl ClipLibrary {
    /// Builds a library from loaded clips, grouping them by their trigger.
    pub fn new(clips: impl IntoIterator<Item = Clip>) -> Result<ClipLibrary, PlaybackError> {
        let mut groups: BTreeMap<TriggerKey, Vec<Clip>> = BTreeMap::new();
        for clip in clips {
            groups.entry(clip.key().clone()).or_default().push(clip);
        }
        ClipLibrary::from_groups(groups)
    }

    /// Builds a library from explicit groups. A trigger with no clips is a
    /// configuration error, as is a library with no triggers at all.
    pub fn from_groups(
        groups: BTreeMap<TriggerKey, Vec<Clip>>,
    ) -> Result<ClipLibrary, PlaybackError> {
        if groups.is_empty() {
            return Err(PlaybackError::EmptyLibrary("no triggers found".to_string()));
        }

        let mut clips = BTreeMap::new();
        for (key, mut group) in groups {
            if group.is_empty() {
                return Err(PlaybackError::EmptyLibrary(format!(
                    "trigger {} has no clips",
                    key
                )));
            }
            group.sort_by(|a, b| a.name().cmp(b.name()));
            clips.insert(key, group.into_iter().map(Arc::new).collect());
        }
        let keys = clips.keys().cloned().collect();

        Ok(ClipLibrary { clips, keys })
    }

    /// Picks one of the clips registered for the trigger, uniformly at random.
    /// Repeats across calls are allowed.
    pub fn pick_clip<R: Rng + ?Sized>(
        &self,
        key: &TriggerKey,
        rng: &mut R,
    ) -> Result<Arc<Clip>, PlaybackError> {
        self.clips
            .get(key)
            .and_then(|clips| clips.choose(rng))
            .cloned()
            .ok_or_else(|| PlaybackError::UnknownTrigger(key.clone()))
    }

    /// Picks a trigger uniformly at random among all known triggers.
    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> TriggerKey {
        // The constructor guarantees at least one key.
        self.keys[rng.gen_range(0..self.keys.len())].clone()
    }

    /// Returns true if the trigger has clips.
    pub fn contains(&self, key: &TriggerKey) -> bool {
        self.clips.contains_key(key)
    }

    /// Returns all known triggers.
    pub fn keys(&self) -> &[TriggerKey] {
        &self.keys
    }

    /// Returns the clips for a trigger.
    pub fn clips(&self, key: &TriggerKey) -> Option<&[Arc<Clip>]> {
        self.clips.get(key).map(|clips| clips.as_slice())
    }

    /// Total number of clips across all triggers.
    pub fn clip_count(&self) -> usize {
        self.clips.values().map(|clips| clips.len()).sum()
    }

    /// Returns the total memory used by the decoded clips.
    pub fn memory_usage(&self) -> usize {
        self.clips
            .values()
            .flatten()
            .map(|clip| clip.memory_size())
            .sum()
    }
}

impl fmt::Debug for ClipLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipLibrary")
            .field("triggers", &self.keys.len())
            .field("clips", &self.clip_count())
            .field("memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
