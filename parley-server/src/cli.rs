//! Command-line argument parsing for parley server

use clap::Parser;
use std::path::PathBuf;

use parley_server::ServerConfig;

/// parley-server - IRC-style chat server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Interface to listen on (overrides listen.host)
    #[arg(long, env = "PARLEY_HOST")]
    pub host: Option<String>,

    /// TCP port to listen on (overrides listen.port)
    #[arg(long, short = 'p', env = "PARLEY_PORT")]
    pub port: Option<u16>,

    /// Configuration file (default: $XDG_CONFIG_HOME/parley/server.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply flag overrides on top of file configuration
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.listen.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listen.port = port;
        }
    }
}
