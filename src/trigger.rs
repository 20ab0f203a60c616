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
use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::{sync::mpsc::Sender, task::JoinHandle};

use crate::config;
use crate::playback::PlayRequest;

pub mod keyboard;
pub mod multi;
pub mod osc;

/// A source of play requests. Drivers push requests onto the sender until their
/// input closes or the receiver goes away.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<PlayRequest>) -> JoinHandle<Result<(), io::Error>>;
}

/// Builds the driver described by the trigger configuration.
pub fn driver(config: &config::Trigger) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    let built: Arc<dyn Driver> = match config {
        config::Trigger::Keyboard(keyboard) => Arc::new(keyboard::Driver::new(keyboard.keys()?)),
        config::Trigger::Osc(osc) => osc::Driver::new(osc)?,
        config::Trigger::Multi(triggers) => {
            let mut names: Vec<&String> = triggers.keys().collect();
            names.sort();
            let sub_drivers = names
                .into_iter()
                .map(|name| driver(&triggers[name]))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(multi::Driver::new(sub_drivers))
        }
    };
    Ok(built)
}
