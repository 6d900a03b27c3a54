//! TCP listener

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use parley_utils::{ParleyError, Result};

use crate::handle_client;
use crate::SharedState;

/// Bind the listening socket
pub async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("TCP listener bound to {}", addr);
            Ok(listener)
        }
        Err(e) => {
            error!("Failed to bind TCP listener to {}: {}", addr, e);
            Err(ParleyError::connection(&e))
        }
    }
}

/// Run the TCP accept loop until shutdown is signalled
pub async fn run_tcp_accept_loop(listener: TcpListener, shared_state: SharedState) {
    let mut shutdown_rx = shared_state.subscribe_shutdown();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!("New TCP connection from {}", peer_addr);
                        let state_clone = shared_state.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_client(reader, writer, state_clone).await;
                        });
                    }
                    Err(e) => {
                        error!("TCP accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping TCP accept loop");
                break;
            }
        }
    }
}
