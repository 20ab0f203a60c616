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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{info, span, warn, Level};

use crate::playback::{ChannelStatus, DeviceChannel, PlaybackError};

/// A mock device. Renders blocks at the pace a real device would, but discards them.
pub struct Device {
    name: String,
    sample_rate: u32,
    block_size: usize,
    status: Mutex<Option<Arc<ChannelStatus>>>,
    running: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32, block_size: usize) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            block_size,
            status: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The status of the attached channel, if any.
    pub fn status(&self) -> Option<Arc<ChannelStatus>> {
        self.status.lock().clone()
    }

    /// Returns true while the render thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, mut channel: DeviceChannel) -> Result<(), Box<dyn Error>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(format!("mock device {} already has a channel", self.name).into());
        }
        let status = channel.status();
        *self.status.lock() = Some(status.clone());

        let name = self.name.clone();
        let running = self.running.clone();
        let block_duration = self.block_duration();
        let mut block = vec![0.0f32; self.block_size];

        thread::spawn(move || {
            let span = span!(Level::INFO, "render (mock)", device = %name);
            let _enter = span.enter();
            info!("Render thread started.");

            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) {
                channel.render(&mut block);
                next += block_duration;
                let now = Instant::now();
                if next > now {
                    spin_sleep::sleep(next - now);
                } else {
                    // Missed the deadline: count it and don't try to catch up.
                    let count = status.record_underrun();
                    warn!(
                        err = %PlaybackError::DeviceUnderrun { device: name.clone() },
                        count,
                        late_us = (now - next).as_micros() as u64,
                        "Render fell behind."
                    );
                    next = now;
                }
            }
            info!("Render thread stopped.");
        });

        Ok(())
    }

    fn underruns(&self) -> u64 {
        self.status().map_or(0, |status| status.underruns())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Device as _;
    use crate::clips::Clip;
    use crate::clock::{Clock, SystemClock};
    use std::sync::atomic::AtomicUsize;
    use crate::playback::{device_channel, ChannelCommand, Cue, FadeLaw};
    use crate::testutil::eventually;

    #[test]
    fn test_mock_renders_attached_channel() {
        let device = Device::get("mock-test", 8000, 80);
        assert!(device.status().is_none());
        assert!(!device.is_running());

        let (handle, channel) = device_channel(
            device.name(),
            Arc::new(SystemClock),
            8000,
            FadeLaw::Linear,
        );
        device.attach(channel).unwrap();
        assert!(device.is_running());

        let clip = Arc::new(Clip::new("hakka", "1.wav", vec![0.5; 8000], 8000));
        handle.send(ChannelCommand::Start(Cue {
            session_id: 1,
            clip,
        }));

        let status = device.status().unwrap();
        eventually(
            || status.current_session() == Some(1),
            "mock device never started the clip",
        );
        eventually(|| status.peak() == 0.5, "mock device never rendered the clip");
        assert!(status.blocks_rendered() > 0);
        assert_eq!(device.to_string(), "mock-test (Mock)");
    }

    #[test]
    fn test_mock_attach_twice() {
        let device = Device::get("mock-test", 8000, 80);
        let (_h1, c1) = device_channel("a", Arc::new(SystemClock), 8000, FadeLaw::Linear);
        let (_h2, c2) = device_channel("b", Arc::new(SystemClock), 8000, FadeLaw::Linear);
        device.attach(c1).unwrap();
        assert!(device.attach(c2).is_err());
    }

    /// A clock that stalls the render thread for the given number of reads.
    struct StallingClock {
        stalls: AtomicUsize,
    }

    impl Clock for StallingClock {
        fn now(&self) -> Instant {
            if self
                .stalls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                thread::sleep(Duration::from_millis(50));
            }
            Instant::now()
        }
    }

    #[test]
    fn test_mock_counts_underruns() {
        let device = Device::get("mock-test", 8000, 80);
        let clock = Arc::new(StallingClock {
            stalls: AtomicUsize::new(1),
        });
        let (handle, channel) = device_channel(device.name(), clock, 8000, FadeLaw::Linear);
        device.attach(channel).unwrap();

        let status = device.status().unwrap();
        eventually(|| device.underruns() >= 1, "stall was never counted");

        // Rendering carries on after the missed deadline.
        let blocks = status.blocks_rendered();
        eventually(
            || status.blocks_rendered() > blocks + 2,
            "mock device stopped rendering after an underrun",
        );

        let clip = Arc::new(Clip::new("hakka", "1.wav", vec![0.5; 8000], 8000));
        handle.send(ChannelCommand::Start(Cue {
            session_id: 7,
            clip,
        }));
        eventually(
            || status.current_session() == Some(7),
            "mock device never started the clip after an underrun",
        );
    }
}
