//! Configuration management for parley server
//!
//! Configuration is read once at startup from a TOML file; command line
//! flags override individual values afterwards.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::*;
