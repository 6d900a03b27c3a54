//! Client-side configuration loading
//!
//! Reads `client.toml` from the parley config directory. Missing files and
//! missing keys fall back to defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use parley_utils::{client_config_file, ParleyError, Result};

use crate::connection::ObserverRouting;

/// Smallest accepted request timeout
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

/// Root client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub observers: ObserverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long the terminal front end waits for a reply (default: 5000)
    pub request_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Report our own JOIN/PART/QUIT to observers (default: false)
    pub notify_self_events: bool,
    /// Events buffered between the observer and the prompt (default: 64)
    pub event_queue: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            notify_self_events: false,
            event_queue: 64,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.request_timeout_ms)
    }

    pub fn routing(&self) -> ObserverRouting {
        ObserverRouting {
            self_events: self.observers.notify_self_events,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<ClientConfig> {
        let path = client_config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!("No client config at {}, using defaults", path.display());
            Ok(ClientConfig::default())
        }
    }

    pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ParleyError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<ClientConfig> {
        toml::from_str(content).map_err(|e| ParleyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(config: &ClientConfig) -> Result<()> {
        if config.connection.request_timeout_ms < MIN_REQUEST_TIMEOUT_MS {
            return Err(ParleyError::config(format!(
                "request_timeout_ms must be at least {}",
                MIN_REQUEST_TIMEOUT_MS
            )));
        }

        if config.observers.event_queue == 0 {
            return Err(ParleyError::config("event_queue must be at least 1"));
        }

        Ok(())
    }

    /// Load from `path` if given, else the default location, then validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<ClientConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
