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
use std::path::Path;
use std::time::Duration;

use duration_string::DurationString;

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Outputs the given duration in a minutes:seconds format.
pub fn duration_minutes_seconds(duration: Duration) -> String {
    let minutes = duration.as_secs() / 60;
    let secs = duration.as_secs() - minutes * 60;
    format!("{}:{:02}", minutes, secs)
}

/// Parses a human duration such as `5m`, `20s` or `1500ms`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    DurationString::from_string(value.trim().to_string())
        .map(Duration::from)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::util::{duration_minutes_seconds, filename_display, parse_duration};

    #[test]
    fn test_duration_minutes_strings() {
        assert_eq!("0:00", duration_minutes_seconds(Duration::new(0, 0)));
        assert_eq!("0:20", duration_minutes_seconds(Duration::new(20, 0)));
        assert_eq!("5:00", duration_minutes_seconds(Duration::new(300, 0)));
        assert_eq!("10:00", duration_minutes_seconds(Duration::new(600, 0)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration(" 20s "), Ok(Duration::from_secs(20)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_filename_display() {
        assert_eq!(filename_display(&PathBuf::from("clips/russian/a.mp3")), "a.mp3");
        assert_eq!(filename_display(&PathBuf::from("/")), "unreadable file name");
    }
}
