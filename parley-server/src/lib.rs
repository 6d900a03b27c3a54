//! parley-server: IRC-style chat server
//!
//! One task per accepted socket reads commands, applies them to the shared
//! [`Registry`](registry::Registry) and writes replies. Notifications for
//! other users are pushed into their outbound queues by the registry.

pub mod config;
pub mod connection;
pub mod handlers;
pub mod listener;
pub mod registry;

use std::sync::Arc;

use tokio::sync::broadcast;

pub use config::{ConfigLoader, ServerConfig};
pub use connection::handle_client;
pub use listener::{bind_listener, run_tcp_accept_loop};
pub use registry::{ClientId, Registry, RegistryError};

/// State shared by the accept loop and every connection task
#[derive(Clone)]
pub struct SharedState {
    /// Users and channels
    pub registry: Arc<Registry>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Shutdown broadcast; every task holding a receiver stops on send
    pub shutdown_tx: broadcast::Sender<()>,
}

impl SharedState {
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Ask the accept loop and all connections to stop
    pub fn shutdown(&self) {
        // No receivers just means nothing is running yet
        let _ = self.shutdown_tx.send(());
    }
}
