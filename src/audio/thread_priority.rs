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
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the render thread when CLIPPLAYER_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// Reads CLIPPLAYER_THREAD_PRIORITY (0-99) once, so the hot path never touches the environment.
pub fn render_thread_priority() -> Option<ThreadPriorityValue> {
    let requested = std::env::var("CLIPPLAYER_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_RENDER_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(requested).ok()
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for render threads.
/// Default: enabled. Opt out with CLIPPLAYER_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("CLIPPLAYER_DISABLE_RT_AUDIO")
}

/// Raises the priority of the calling thread once. `priority_set` is flipped on the
/// first call so the callback can invoke this unconditionally.
pub fn configure_render_thread_priority(
    priority: Option<ThreadPriorityValue>,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    let _ = set_current_thread_priority(tp);

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for render thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for render thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_env_flag() {
        std::env::set_var("CLIPPLAYER_DISABLE_RT_AUDIO", "yes");
        assert!(!rt_audio_enabled());
        std::env::set_var("CLIPPLAYER_DISABLE_RT_AUDIO", "0");
        assert!(rt_audio_enabled());
        std::env::remove_var("CLIPPLAYER_DISABLE_RT_AUDIO");
        assert!(rt_audio_enabled());
    }

    #[test]
    #[serial]
    fn test_render_thread_priority() {
        std::env::set_var("CLIPPLAYER_THREAD_PRIORITY", "150");
        let default = render_thread_priority();
        std::env::set_var("CLIPPLAYER_THREAD_PRIORITY", "50");
        let requested = render_thread_priority();
        std::env::remove_var("CLIPPLAYER_THREAD_PRIORITY");

        assert_eq!(
            default,
            ThreadPriorityValue::try_from(DEFAULT_RENDER_THREAD_PRIORITY).ok()
        );
        assert_eq!(requested, ThreadPriorityValue::try_from(50u8).ok());
    }
}
