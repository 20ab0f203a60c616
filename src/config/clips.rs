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
use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_EXTENSION: &str = "mp3";

/// Where clips are loaded from.
#[derive(Deserialize, Clone, Debug)]
pub struct Clips {
    /// The directory holding the clips.
    path: PathBuf,

    /// The file extension of clips to load (default: mp3).
    extension: Option<String>,
}

impl Clips {
    pub fn new(path: impl Into<PathBuf>, extension: Option<&str>) -> Clips {
        Clips {
            path: path.into(),
            extension: extension.map(str::to_string),
        }
    }

    /// Returns the clip directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the clip file extension, without a leading dot.
    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or(DEFAULT_EXTENSION)
    }
}
