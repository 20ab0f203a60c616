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
use std::io;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::error;

use crate::playback::PlayRequest;

/// A driver that merges the requests of several other drivers.
pub struct Driver {
    sub_drivers: Vec<Arc<dyn super::Driver>>,
}

impl Driver {
    pub fn new(sub_drivers: Vec<Arc<dyn super::Driver>>) -> Driver {
        Driver { sub_drivers }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<PlayRequest>) -> JoinHandle<Result<(), io::Error>> {
        let join_handles = self
            .sub_drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect::<Vec<_>>();
        drop(events_tx);

        tokio::spawn(async move {
            let mut failed = 0;
            for result in join_all(join_handles).await {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(err = %e, "Trigger driver failed.");
                        failed += 1;
                    }
                    Err(e) => {
                        error!(err = %e, "Trigger driver panicked.");
                        failed += 1;
                    }
                }
            }
            if failed == 0 {
                Ok(())
            } else {
                Err(io::Error::other(format!("{} trigger drivers failed", failed)))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::sync::mpsc;

    use super::*;
    use crate::trigger::Driver as _;

    /// Sends a fixed list of keys and then stops.
    struct ScriptedDriver {
        keys: Vec<&'static str>,
    }

    impl crate::trigger::Driver for ScriptedDriver {
        fn monitor_events(
            &self,
            events_tx: Sender<PlayRequest>,
        ) -> JoinHandle<Result<(), io::Error>> {
            let keys = self.keys.clone();
            tokio::spawn(async move {
                for key in keys {
                    events_tx
                        .send(PlayRequest::trigger(key, Instant::now()))
                        .await
                        .map_err(io::Error::other)?;
                }
                Ok::<(), io::Error>(())
            })
        }
    }

    struct FailingDriver;

    impl crate::trigger::Driver for FailingDriver {
        fn monitor_events(&self, _: Sender<PlayRequest>) -> JoinHandle<Result<(), io::Error>> {
            tokio::spawn(async { Err(io::Error::other("no device")) })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_multi_driver() {
        let driver = Driver::new(vec![
            Arc::new(ScriptedDriver {
                keys: vec!["tamil", "hakka"],
            }),
            Arc::new(ScriptedDriver {
                keys: vec!["kurdish"],
            }),
        ]);
        let (tx, mut rx) = mpsc::channel(10);
        let handle = driver.monitor_events(tx);

        let mut keys = Vec::new();
        while let Some(request) = rx.recv().await {
            keys.push(request.key.to_string());
        }
        keys.sort();
        assert_eq!(keys, vec!["hakka", "kurdish", "tamil"]);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_multi_driver_failure() {
        let driver = Driver::new(vec![
            Arc::new(ScriptedDriver { keys: vec![] }),
            Arc::new(FailingDriver),
        ]);
        let (tx, _rx) = mpsc::channel(10);
        assert!(driver.monitor_events(tx).await.unwrap().is_err());
    }
}
