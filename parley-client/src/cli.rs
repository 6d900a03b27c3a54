//! Command-line argument parsing for the parley client

use clap::Parser;
use std::path::PathBuf;

/// parley - terminal chat client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server host name or address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    /// Nickname to register (at most 9 characters)
    pub nick: String,

    /// Configuration file (default: $XDG_CONFIG_HOME/parley/client.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
