//! Logging setup for the parley binaries
//!
//! The server logs to stderr. The terminal client owns stdout and stderr for
//! the prompt, so it logs to a file under [`paths::log_dir`].

use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, ParleyError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PARLEY_LOG";

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Append to this file in the log directory
    File(String),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directives, e.g. "info" or "parley_server=debug,tokio=warn"
    pub filter: String,
    /// Include file/line in logs
    pub file_line: bool,
}

impl LogConfig {
    /// Terminal client: file logging, quiet unless `PARLEY_LOG` says otherwise
    pub fn client() -> Self {
        Self {
            output: LogOutput::File("parley-client.log".into()),
            filter: filter_from_env("warn"),
            file_line: false,
        }
    }

    /// Chat server: stderr logging
    pub fn server() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: filter_from_env("info"),
            file_line: true,
        }
    }
}

fn filter_from_env(default: &str) -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| default.into())
}

/// Install the global subscriber
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ParleyError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.output {
        LogOutput::Stderr => registry.with(fmt_layer.with_writer(std::io::stderr)).try_init(),
        LogOutput::File(name) => {
            let log_dir = paths::log_dir();
            std::fs::create_dir_all(&log_dir).map_err(|e| ParleyError::FileWrite {
                path: log_dir.clone(),
                source: e,
            })?;

            let log_path = log_dir.join(name);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .map_err(|e| ParleyError::FileWrite {
                    path: log_path,
                    source: e,
                })?;

            registry
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
        }
    };

    installed.map_err(|e| ParleyError::internal(format!("Failed to init logging: {}", e)))
}
