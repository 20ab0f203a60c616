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
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::{
    sync::{mpsc::Sender, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, span, warn, Level};

use crate::clips::TriggerKey;
use crate::playback::PlayRequest;

/// A driver that reads trigger keys from standard input, one per line. A line
/// holding a single mapped character fires the mapped key; anything else is
/// taken as the key name itself.
pub struct Driver {
    keys: Arc<HashMap<char, TriggerKey>>,
    /// Opens the input on the reader thread.
    input: fn() -> Box<dyn io::BufRead>,
}

fn stdin_input() -> Box<dyn io::BufRead> {
    Box::new(io::stdin().lock())
}

impl Driver {
    pub fn new(keys: HashMap<char, TriggerKey>) -> Driver {
        Driver::with_input(keys, stdin_input)
    }

    fn with_input(keys: HashMap<char, TriggerKey>, input: fn() -> Box<dyn io::BufRead>) -> Driver {
        Driver {
            keys: Arc::new(keys),
            input,
        }
    }

    /// Resolves a line of input to a trigger key.
    fn resolve(keys: &HashMap<char, TriggerKey>, input: &str) -> Option<TriggerKey> {
        let input = input.trim();
        let mut chars = input.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) if keys.contains_key(&c) => keys.get(&c).cloned(),
            _ => Some(TriggerKey::new(input)),
        }
    }

    /// Reads one line and sends the request it names. Returns false once the
    /// reader is exhausted or the receiver has gone away.
    fn monitor_io<R, W>(
        keys: &HashMap<char, TriggerKey>,
        events_tx: &Sender<PlayRequest>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Trigger: ")?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match Self::resolve(keys, &input) {
            Some(key) => {
                debug!(key = %key, "Keyboard trigger.");
                if events_tx
                    .blocking_send(PlayRequest::trigger(key, Instant::now()))
                    .is_err()
                {
                    return Ok(false);
                }
            }
            None => warn!("Empty input, ignoring."),
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    /// Input is read on a dedicated thread rather than the blocking pool, so a
    /// read that never returns cannot hold up runtime shutdown. The returned task
    /// finishes when the input closes or the request receiver goes away.
    fn monitor_events(&self, events_tx: Sender<PlayRequest>) -> JoinHandle<Result<(), io::Error>> {
        let keys = self.keys.clone();
        let input = self.input;
        let reader_tx = events_tx.clone();
        let (done_tx, done_rx) = oneshot::channel();

        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!(mapped = keys.len(), "Keyboard driver started.");

            let mut reader = input();
            let result = loop {
                match Self::monitor_io(&keys, &reader_tx, &mut reader, io::stdout()) {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };

            info!("Keyboard input closed.");
            let _ = done_tx.send(result);
        });

        tokio::spawn(async move {
            tokio::select! {
                result = done_rx => result.unwrap_or_else(|_| {
                    Err(io::Error::other("keyboard thread exited"))
                }),
                _ = events_tx.closed() => {
                    info!("Request receiver closed, keyboard driver stopping.");
                    Ok(())
                }
            }
        })
    }
}
