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

use serde::Deserialize;

use super::error::ConfigError;
use crate::clips::TriggerKey;

const DEFAULT_OSC_PORT: u16 = 9000;
const DEFAULT_OSC_ADDRESS: &str = "/trigger";
const DEFAULT_OSC_BIND: &str = "0.0.0.0";

/// Allows users to specify where triggers come from.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Trigger {
    Keyboard(KeyboardTrigger),
    Osc(OscTrigger),
    Multi(HashMap<String, Trigger>),
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::Keyboard(KeyboardTrigger::default())
    }
}

impl Trigger {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Trigger::Keyboard(keyboard) => keyboard.keys().map(|_| ()),
            Trigger::Osc(osc) => osc.validate(),
            Trigger::Multi(triggers) => {
                if triggers.is_empty() {
                    return Err(ConfigError::Invalid("multi trigger has no triggers".into()));
                }
                triggers.values().try_for_each(Trigger::validate)
            }
        }
    }
}

/// Reads trigger keys from standard input, one per line.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct KeyboardTrigger {
    /// Single characters mapped to the trigger they fire.
    #[serde(default)]
    keys: HashMap<String, String>,
}

impl KeyboardTrigger {
    pub fn new(keys: HashMap<String, String>) -> KeyboardTrigger {
        KeyboardTrigger { keys }
    }

    /// Returns the character map.
    pub fn keys(&self) -> Result<HashMap<char, TriggerKey>, ConfigError> {
        self.keys
            .iter()
            .map(|(character, key)| {
                let mut chars = character.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok((c, TriggerKey::new(key.as_str()))),
                    _ => Err(ConfigError::Invalid(format!(
                        "keyboard key {:?} must be a single character",
                        character
                    ))),
                }
            })
            .collect()
    }
}

/// Listens for OSC messages on a UDP port.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct OscTrigger {
    /// The UDP port to listen on (default: 9000).
    port: Option<u16>,

    /// The address to bind to (default: 0.0.0.0).
    bind: Option<String>,

    /// The OSC address pattern that fires a trigger (default: /trigger).
    address: Option<String>,
}

impl OscTrigger {
    pub fn new(port: u16, bind: Option<&str>, address: Option<&str>) -> OscTrigger {
        OscTrigger {
            port: Some(port),
            bind: bind.map(str::to_string),
            address: address.map(str::to_string),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_OSC_PORT)
    }

    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_OSC_BIND)
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_OSC_ADDRESS)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.address().starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "OSC address {:?} must start with /",
                self.address()
            )));
        }
        Ok(())
    }
}
