//! parley-utils: Common utilities shared across parley crates
//!
//! This crate provides:
//! - Unified error types ([`ParleyError`], [`Result`])
//! - Connection failure classification ([`ConnectionErrorKind`])
//! - Logging setup ([`init_logging_with_config`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{ConnectionErrorKind, ParleyError, Result};
pub use logging::{init_logging_with_config, LogConfig, LogOutput};

pub use paths::{client_config_file, config_dir, log_dir, server_config_file, state_dir};
