//! Server configuration.
//!
//! Loaded once at startup from `server.yaml` in the working directory.
//! The `passwords` list accepts both bare secrets and `{secret: nickname}`
//! pairs; nicknames feed the subscription endpoint.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_PROTOCOL_ID: i32 = 773;
const DEFAULT_MAX_PLAYERS: i32 = 20;

/// Contents of `server.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// TCP port the Minecraft-looking listener accepts on
    pub listen_port: String,
    /// Authorized secrets, optionally with nicknames
    #[serde(default)]
    pub passwords: Vec<PasswordEntry>,
    /// Port for the subscription HTTP endpoint; unset disables it
    #[serde(default)]
    pub subs_listen_port: Option<String>,
    /// Version name advertised in status
    #[serde(default)]
    pub version_name: String,
    /// Protocol number advertised in status
    #[serde(default)]
    pub protocol_id: i32,
    /// PNG served as the status favicon, re-read per request
    #[serde(default)]
    pub icon_path: Option<String>,
    /// Status description text
    #[serde(default)]
    pub motd: String,
    /// Player capacity advertised in status
    #[serde(default)]
    pub max_players: i32,
    /// Lower bound for the simulated online count
    #[serde(default)]
    pub online_min: i32,
    /// Upper bound for the simulated online count
    #[serde(default)]
    pub online_max: i32,
}

/// One element of the `passwords` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PasswordEntry {
    /// `- hunter2`
    Secret(String),
    /// `- hunter2: alice`
    Named(HashMap<String, String>),
}

impl Config {
    /// Read and parse a YAML config file.
    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("could not open {path}: {e}")))?;
        let mut config: Config = serde_yaml::from_str(&text)
            .map_err(|e| Error::config(format!("invalid {path}: {e}")))?;
        config.apply_defaults();
        Ok(config)
    }

    /// Fill in defaults for fields left unset (or explicitly zeroed).
    pub fn apply_defaults(&mut self) {
        if self.protocol_id == 0 {
            self.protocol_id = DEFAULT_PROTOCOL_ID;
        }
        if self.max_players == 0 {
            self.max_players = DEFAULT_MAX_PLAYERS;
        }
    }

    /// Flatten the password list into `(secret, optional nickname)` pairs.
    pub fn credentials(&self) -> Vec<(String, Option<String>)> {
        let mut pairs = Vec::new();
        for entry in &self.passwords {
            match entry {
                PasswordEntry::Secret(secret) => pairs.push((secret.clone(), None)),
                PasswordEntry::Named(map) => {
                    for (secret, nickname) in map {
                        pairs.push((secret.clone(), Some(nickname.clone())));
                    }
                }
            }
        }
        pairs
    }
}
