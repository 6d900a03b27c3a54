//! Configuration schema structs

use serde::{Deserialize, Serialize};

use parley_protocol::DEFAULT_PORT;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: ListenConfig,
    pub server: ServerSettings,
}

/// Where the server accepts connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Interface to bind (default: all interfaces)
    pub host: String,
    /// TCP port (default: 6667)
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

impl ListenConfig {
    /// `host:port` string for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Behaviour of the chat server itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Text sent in reply to `INFO`
    pub info_text: String,
    /// Lines buffered per connection before new ones are dropped
    pub outbound_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            info_text: "Simplified IRC server written in Rust".into(),
            outbound_queue: 1024,
        }
    }
}
