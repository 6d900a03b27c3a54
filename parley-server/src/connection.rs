//! Per-connection task
//!
//! Each accepted socket gets a reader loop (this task) and a writer task.
//! Everything addressed to the client, including notifications routed by
//! other handlers, goes through one bounded queue that the writer drains.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use parley_protocol::{ServerCodec, ServerMessage};

use crate::handlers::{HandlerContext, HandlerResult};
use crate::registry::ClientId;
use crate::SharedState;

/// Serve one client until it quits, the socket ends, or the server shuts down
pub async fn handle_client<R, W>(reader: R, writer: W, state: SharedState)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let client_id = state.registry.next_client_id();
    info!("Connected to {}", client_id);

    let (tx, rx) = mpsc::channel(state.config.server.outbound_queue);
    let writer_task = tokio::spawn(write_loop(client_id, writer, rx));

    let mut ctx = HandlerContext::new(
        state.registry.clone(),
        state.config.clone(),
        client_id,
        tx.clone(),
    );
    let mut lines = FramedRead::new(reader, ServerCodec::new());
    let mut shutdown_rx = state.subscribe_shutdown();

    loop {
        tokio::select! {
            item = lines.next() => {
                let result = match item {
                    Some(Ok(Ok(command))) => {
                        debug!("<{}> {}", client_id, command);
                        ctx.route_message(command)
                    }
                    Some(Ok(Err(parse_error))) => ctx.handle_parse_error(&parse_error),
                    Some(Err(e)) => {
                        warn!("{} read error: {}", client_id, e);
                        break;
                    }
                    None => {
                        debug!("{} closed the connection", client_id);
                        break;
                    }
                };

                match result {
                    HandlerResult::Response(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    HandlerResult::NoResponse => {}
                    HandlerResult::Close => break,
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("{} stopping for shutdown", client_id);
                break;
            }
        }
    }

    ctx.handle_disconnect();

    // The writer stops once every sender is gone, after flushing what is queued
    drop(ctx);
    drop(tx);
    if let Err(e) = writer_task.await {
        warn!("{} writer task failed: {}", client_id, e);
    }

    info!("Disconnected from {}", client_id);
}

async fn write_loop<W>(client_id: ClientId, writer: W, mut rx: mpsc::Receiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(writer, ServerCodec::new());

    while let Some(message) = rx.recv().await {
        debug!("<{}> <- {}", client_id, message);
        if let Err(e) = framed.send(message).await {
            warn!("{} write error: {}", client_id, e);
            return;
        }
    }

    let _ = framed.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::time::timeout;

    struct TestClient {
        lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
        writer: tokio::io::WriteHalf<DuplexStream>,
    }

    impl TestClient {
        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{}\r\n", line).as_bytes())
                .await
                .unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            timeout(Duration::from_secs(2), self.lines.next_line())
                .await
                .expect("timed out waiting for a line")
                .unwrap()
        }
    }

    fn connect(state: &SharedState) -> (TestClient, tokio::task::JoinHandle<()>) {
        let (client_side, server_side) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let handle = tokio::spawn(handle_client(server_read, server_write, state.clone()));

        let (client_read, client_write) = tokio::io::split(client_side);
        let client = TestClient {
            lines: BufReader::new(client_read).lines(),
            writer: client_write,
        };
        (client, handle)
    }

    #[tokio::test]
    async fn test_register_and_ping() {
        let state = SharedState::new(ServerConfig::default());
        let (mut c, _handle) = connect(&state);

        c.send("PING early").await;
        assert_eq!(c.recv().await.unwrap(), "PONG early");

        c.send("NICK alice").await;
        assert_eq!(
            c.recv().await.unwrap(),
            "REPLY_NICK :Welcome to the IRC network, alice"
        );
    }

    #[tokio::test]
    async fn test_bad_lines_keep_connection_alive() {
        let state = SharedState::new(ServerConfig::default());
        let (mut c, _handle) = connect(&state);

        c.send("JOIN #a").await;
        assert_eq!(c.recv().await.unwrap(), "ERROR :You need to register first");

        c.send("FROB").await;
        assert_eq!(c.recv().await.unwrap(), "ERROR :Unknown command");

        c.send("NICK bob").await;
        c.recv().await.unwrap();
        c.send("PRIVMSG alice no-colon").await;
        assert_eq!(
            c.recv().await.unwrap(),
            "ERROR :Invalid arguments to PRIVMSG command"
        );
    }

    #[tokio::test]
    async fn test_two_clients_chat() {
        let state = SharedState::new(ServerConfig::default());
        let (mut a, _ha) = connect(&state);
        let (mut b, _hb) = connect(&state);

        a.send("NICK alice").await;
        a.recv().await.unwrap();
        b.send("NICK bob").await;
        b.recv().await.unwrap();

        a.send("JOIN #test").await;
        assert_eq!(a.recv().await.unwrap(), ":alice JOIN #test");
        b.send("JOIN #test").await;
        assert_eq!(b.recv().await.unwrap(), ":bob JOIN #test");
        assert_eq!(a.recv().await.unwrap(), ":bob JOIN #test");

        a.send("NAMES #test").await;
        assert_eq!(a.recv().await.unwrap(), "REPLY_NAMES #test :alice bob");

        b.send("PRIVMSG #test :hello").await;
        assert_eq!(a.recv().await.unwrap(), ":bob PRIVMSG #test :hello");
        assert_eq!(b.recv().await.unwrap(), ":bob PRIVMSG #test :hello");
    }

    #[tokio::test]
    async fn test_eof_broadcasts_quit() {
        let state = SharedState::new(ServerConfig::default());
        let (mut a, _ha) = connect(&state);
        let (mut b, hb) = connect(&state);

        a.send("NICK alice").await;
        a.recv().await.unwrap();
        b.send("NICK bob").await;
        b.recv().await.unwrap();
        b.send("JOIN #gone").await;
        b.recv().await.unwrap();

        drop(b);
        timeout(Duration::from_secs(2), hb).await.unwrap().unwrap();

        assert_eq!(a.recv().await.unwrap(), ":bob QUIT");
        assert!(!state.registry.is_registered("bob"));
        assert_eq!(state.registry.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_quit_closes_socket() {
        let state = SharedState::new(ServerConfig::default());
        let (mut c, handle) = connect(&state);

        c.send("NICK alice").await;
        c.recv().await.unwrap();
        c.send("QUIT").await;

        assert_eq!(c.recv().await.unwrap(), ":alice QUIT");
        assert_eq!(c.recv().await, None);
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(state.registry.user_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_connection() {
        let state = SharedState::new(ServerConfig::default());
        let (mut c, handle) = connect(&state);
        c.send("NICK alice").await;
        c.recv().await.unwrap();

        state.shutdown();

        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(!state.registry.is_registered("alice"));
    }
}
