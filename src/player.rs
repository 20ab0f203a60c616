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
use std::{error::Error, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tokio::{
    select,
    sync::{mpsc, Notify},
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    audio,
    clips::{self, ClipLibrary},
    clock::{SharedClock, SystemClock},
    config,
    playback::{
        device_channel, ChannelCommand, ChannelStatus, ControllerStatus, DeviceBank, Outcome,
        PlaybackController, PlaybackError, PlaybackState,
    },
    trigger,
};

/// How often the control loop checks the idle watchdog and retires finished sessions.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// The number of trigger requests that may queue up behind the controller.
const REQUEST_QUEUE_SIZE: usize = 16;

/// Runs an installation: the clip library, the output devices and the control loop
/// that feeds trigger requests and idle fallbacks to the playback controller.
pub struct Player {
    /// The loaded clips.
    library: Arc<ClipLibrary>,
    /// The devices every clip is mirrored to.
    devices: Vec<Arc<dyn audio::Device>>,
    /// Render statistics for each device, in device order.
    channels: Vec<Arc<ChannelStatus>>,
    /// The controller status as of the last processed event.
    status: Arc<RwLock<ControllerStatus>>,
    /// Signals the control loop to stop.
    shutdown: Arc<Notify>,
    /// The control loop.
    join: JoinHandle<()>,
}

impl Player {
    /// Loads the clips, opens the devices and starts the control loop. Must be called
    /// from within a tokio runtime.
    pub fn new(
        config: &config::Player,
        driver: Arc<dyn trigger::Driver>,
    ) -> Result<Player, Box<dyn Error>> {
        let library = Arc::new(clips::load_library(
            config.clips().path(),
            config.clips().extension(),
            config.audio().sample_rate(),
        )?);
        Player::with_library(library, config, driver, Arc::new(SystemClock))
    }

    /// Starts a player over an already loaded library.
    pub fn with_library(
        library: Arc<ClipLibrary>,
        config: &config::Player,
        driver: Arc<dyn trigger::Driver>,
        clock: SharedClock,
    ) -> Result<Player, Box<dyn Error>> {
        let playback = config.playback();
        let fade_law = playback.fade_law();
        let strategy = playback.overlap_strategy()?;
        let fallback_time = playback.fallback_time()?;
        let sample_rate = config.audio().sample_rate();

        let devices = audio::find_devices(config.audio())?;
        let mut handles = Vec::with_capacity(devices.len());
        let mut channels = Vec::with_capacity(devices.len());
        for device in devices.iter() {
            let (handle, channel) =
                device_channel(device.name(), clock.clone(), sample_rate, fade_law);
            channels.push(channel.status());
            device.attach(channel)?;
            handles.push(handle);
        }

        let controller = PlaybackController::new(
            library.clone(),
            strategy,
            fallback_time,
            DeviceBank::new(handles),
            clock.now(),
        )
        .with_same_trigger(playback.same_trigger());

        info!(
            triggers = library.keys().len(),
            clips = library.clip_count(),
            devices = devices.len(),
            strategy = %strategy,
            fallback_secs = fallback_time.as_secs_f64(),
            "Player started."
        );

        let status = Arc::new(RwLock::new(controller.status()));
        let shutdown = Arc::new(Notify::new());
        let join = tokio::spawn(
            Player::control_loop(controller, driver, clock, status.clone(), shutdown.clone())
                .instrument(span!(Level::INFO, "player")),
        );

        Ok(Player {
            library,
            devices,
            channels,
            status,
            shutdown,
            join,
        })
    }

    /// Serializes trigger requests and watchdog ticks onto the controller until the
    /// trigger drivers close or the player is stopped.
    async fn control_loop(
        mut controller: PlaybackController,
        driver: Arc<dyn trigger::Driver>,
        clock: SharedClock,
        status: Arc<RwLock<ControllerStatus>>,
        shutdown: Arc<Notify>,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let driver_handle = driver.monitor_events(events_tx);

        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Pending requests always go before a watchdog tick.
            select! {
                biased;
                _ = shutdown.notified() => {
                    info!("Player stopping.");
                    break;
                }
                request = events_rx.recv() => {
                    let Some(request) = request else {
                        info!("Trigger drivers closed.");
                        break;
                    };
                    match controller.handle(request, clock.now()) {
                        Ok(Outcome::Rejected) | Err(PlaybackError::UnknownTrigger(_)) => {}
                        Ok(outcome) => debug!(outcome = ?outcome, "Request accepted."),
                        Err(e) => error!(err = %e, "Error handling request."),
                    }
                }
                _ = interval.tick() => {
                    if let Some(Err(e)) = controller.tick(clock.now()) {
                        error!(err = %e, "Error playing fallback clip.");
                    }
                }
            }

            let current = controller.status();
            if *status.read() != current {
                debug!(status = %current, "Status changed.");
                *status.write() = current;
            }
        }

        controller.bank().broadcast(&ChannelCommand::Stop);
        *status.write() = ControllerStatus {
            state: PlaybackState::Idle,
            current: None,
            outgoing: None,
        };

        // The drivers may still be blocked on their input, so they are left to finish
        // on their own when the player was stopped.
        if driver_handle.is_finished() {
            match driver_handle.await {
                Ok(Err(e)) => error!(err = %e, "Trigger driver failed."),
                Err(e) => error!(err = %e, "Error waiting for trigger driver."),
                Ok(Ok(())) => {}
            }
        }
    }

    /// Stops the control loop and silences every device.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Waits until the control loop finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.join).await
    }

    /// Returns the controller state and the names of the current and outgoing clips.
    pub fn status(&self) -> ControllerStatus {
        self.status.read().clone()
    }

    pub fn library(&self) -> Arc<ClipLibrary> {
        self.library.clone()
    }

    pub fn devices(&self) -> &[Arc<dyn audio::Device>] {
        &self.devices
    }

    /// Render statistics for each device, in device order.
    pub fn channels(&self) -> &[Arc<ChannelStatus>] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io, path::Path, time::Instant};

    use serial_test::serial;
    use tokio::sync::mpsc::Sender;

    use super::*;
    use crate::{
        playback::PlayRequest,
        testutil::{self, eventually_async},
    };

    /// Forwards requests from a channel held by the test.
    struct ForwardingDriver {
        rx: parking_lot::Mutex<Option<mpsc::Receiver<PlayRequest>>>,
    }

    impl ForwardingDriver {
        fn new() -> (Sender<PlayRequest>, Arc<ForwardingDriver>) {
            let (tx, rx) = mpsc::channel(10);
            (
                tx,
                Arc::new(ForwardingDriver {
                    rx: parking_lot::Mutex::new(Some(rx)),
                }),
            )
        }
    }

    impl trigger::Driver for ForwardingDriver {
        fn monitor_events(
            &self,
            events_tx: Sender<PlayRequest>,
        ) -> JoinHandle<Result<(), io::Error>> {
            let rx = self.rx.lock().take();
            tokio::spawn(async move {
                let Some(mut rx) = rx else {
                    return Ok(());
                };
                while let Some(request) = rx.recv().await {
                    if events_tx.send(request).await.is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn write_clips(root: &Path) {
        fs::create_dir_all(root.join("tamil")).unwrap();
        let tone = testutil::sine(440.0, 0.5, 8000, 8000);
        testutil::write_wav(&root.join("tamil/1.wav"), &[tone.clone()], 8000).unwrap();
        testutil::write_wav(&root.join("hakka.wav"), &[tone], 8000).unwrap();
    }

    fn config(root: &Path, fallback_time: &str) -> config::Player {
        config::Player::from_yaml(&format!(
            r#"
clips:
  path: {}
  extension: wav
audio:
  device_filter: mock
  mock_devices: 2
  sample_rate: 8000
  block_size: 80
playback:
  fallback_time: {}
  fade_length: 100ms
"#,
            root.display(),
            fallback_time
        ))
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_player_triggers() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clips(dir.path());

        let (tx, driver) = ForwardingDriver::new();
        let mut player = Player::new(&config(dir.path(), "5m"), driver)?;
        assert_eq!(player.devices().len(), 2);
        assert_eq!(player.status().state, PlaybackState::Idle);

        tx.send(PlayRequest::trigger("tamil", Instant::now())).await?;
        eventually_async(
            || async { player.status().state == PlaybackState::Playing },
            "Player never started playing",
        )
        .await;
        assert!(player.status().current.unwrap().starts_with("tamil/"));
        for channel in player.channels() {
            eventually_async(
                || async { channel.current_session().is_some() },
                "Device never started the clip",
            )
            .await;
        }

        tx.send(PlayRequest::trigger("hakka", Instant::now())).await?;
        eventually_async(
            || async {
                let status = player.status();
                status.current.is_some_and(|c| c.starts_with("hakka/"))
            },
            "Player never crossfaded to hakka",
        )
        .await;

        // Unknown triggers are logged and dropped.
        tx.send(PlayRequest::trigger("klingon", Instant::now())).await?;

        drop(tx);
        player.join().await?;
        assert_eq!(player.status().state, PlaybackState::Idle);
        for channel in player.channels() {
            eventually_async(
                || async { channel.current_session().is_none() },
                "Device never stopped",
            )
            .await;
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_player_fallback() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_clips(dir.path());

        let (_tx, driver) = ForwardingDriver::new();
        let mut player = Player::new(&config(dir.path(), "200ms"), driver)?;

        eventually_async(
            || async { player.status().state == PlaybackState::Playing },
            "Fallback never played",
        )
        .await;

        player.stop();
        player.join().await?;
        assert_eq!(player.status().state, PlaybackState::Idle);
        Ok(())
    }
}
