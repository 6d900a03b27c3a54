//! Configuration loader

use std::path::Path;

use parley_utils::{server_config_file, ParleyError, Result};

use super::ServerConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<ServerConfig> {
        let path = server_config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(ServerConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<ServerConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ParleyError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<ServerConfig> {
        toml::from_str(content).map_err(|e| ParleyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &ServerConfig) -> Result<()> {
        if config.server.outbound_queue == 0 {
            return Err(ParleyError::config("outbound_queue must be at least 1"));
        }

        if config.listen.host.trim().is_empty() {
            return Err(ParleyError::config("listen.host cannot be empty"));
        }

        Ok(())
    }

    /// Load from `path` if given, else the default location, then validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<ServerConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
