//! Path utilities for parley
//!
//! Handles XDG Base Directory specification compliance for config and
//! state directories.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const APP_NAME: &str = "parley";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/parley` or `~/.config/parley`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config").join(APP_NAME))
}

/// Server configuration file: `$XDG_CONFIG_HOME/parley/server.toml`
pub fn server_config_file() -> PathBuf {
    config_dir().join("server.toml")
}

/// Client configuration file: `$XDG_CONFIG_HOME/parley/client.toml`
pub fn client_config_file() -> PathBuf {
    config_dir().join("client.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/parley` or `~/.local/state/parley`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| home_dir().join(".local").join("state").join(APP_NAME))
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/parley/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
