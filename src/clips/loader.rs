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

//! Clip discovery and loading.
//!
//! Clips are loaded entirely into memory at startup. Two layouts are recognized
//! and may be mixed:
//!
//! - `<root>/<key>/**/*.<ext>`: every file under the directory plays for `key`.
//! - `<root>/<key>.<ext>`: a single clip for `key`.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::decode::{self, ClipSourceError};
use super::{Clip, ClipLibrary, TriggerKey};
use crate::util;

/// Finds clip files under the root, grouped by trigger. Keys whose directory holds
/// no matching files are kept with an empty list so the library can reject them.
pub fn discover(
    root: &Path,
    extension: &str,
) -> Result<BTreeMap<TriggerKey, Vec<PathBuf>>, ClipSourceError> {
    if !root.is_dir() {
        return Err(ClipSourceError::NotADirectory(root.to_path_buf()));
    }

    let mut found: BTreeMap<TriggerKey, Vec<PathBuf>> = BTreeMap::new();
    for path in read_dir_sorted(root)? {
        if path.is_dir() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Hidden directories are not triggers.
            if name.starts_with('.') {
                continue;
            }
            let mut files = Vec::new();
            collect_files(&path, extension, &mut files)?;
            found.entry(TriggerKey::new(name)).or_default().extend(files);
        } else if has_extension(&path, extension) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                found.entry(TriggerKey::new(stem)).or_default().push(path);
            }
        }
    }

    Ok(found)
}

fn collect_files(
    dir: &Path,
    extension: &str,
    files: &mut Vec<PathBuf>,
) -> Result<(), ClipSourceError> {
    for path in read_dir_sorted(dir)? {
        if path.is_dir() {
            collect_files(&path, extension, files)?;
        } else if has_extension(&path, extension) {
            files.push(path);
        }
    }
    Ok(())
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, ClipSourceError> {
    let io_err = |source| ClipSourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Decodes a single clip, downmixing to mono and resampling to the target rate.
pub fn load_clip(
    key: TriggerKey,
    path: &Path,
    target_sample_rate: u32,
) -> Result<Clip, ClipSourceError> {
    let decoded = decode::decode_file(path)?;

    if decoded.channels > 1 {
        warn!(
            path = ?path,
            channels = decoded.channels,
            "Clip is not mono, downmixing."
        );
    }
    let mono = decode::downmix(&decoded.samples, decoded.channels);

    let samples = if decoded.sample_rate != target_sample_rate {
        debug!(
            path = ?path,
            source_rate = decoded.sample_rate,
            target_rate = target_sample_rate,
            "Transcoding clip"
        );
        decode::resample(path, &mono, decoded.sample_rate, target_sample_rate)?
    } else {
        mono
    };

    Ok(Clip::new(
        key,
        util::filename_display(path),
        samples,
        target_sample_rate,
    ))
}

/// Discovers and decodes every clip under the root into a library.
pub fn load_library(
    root: &Path,
    extension: &str,
    target_sample_rate: u32,
) -> Result<ClipLibrary, Box<dyn Error>> {
    let start = Instant::now();
    let discovered = discover(root, extension)?;

    let files: Vec<(TriggerKey, PathBuf)> = discovered
        .iter()
        .flat_map(|(key, paths)| paths.iter().map(move |p| (key.clone(), p.clone())))
        .collect();

    let clips = files
        .par_iter()
        .map(|(key, path)| load_clip(key.clone(), path, target_sample_rate))
        .collect::<Result<Vec<Clip>, ClipSourceError>>()?;

    let mut groups: BTreeMap<TriggerKey, Vec<Clip>> = discovered
        .into_keys()
        .map(|key| (key, Vec::new()))
        .collect();
    for clip in clips {
        groups.entry(clip.key().clone()).or_default().push(clip);
    }

    let library = ClipLibrary::from_groups(groups)?;
    info!(
        path = ?root,
        triggers = library.keys().len(),
        clips = library.clip_count(),
        memory_kb = library.memory_usage() / 1024,
        elapsed_ms = start.elapsed().as_millis(),
        "Clip library loaded"
    );

    Ok(library)
}
