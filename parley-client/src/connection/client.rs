//! Chat client connection engine
//!
//! One reader task per connection decodes server lines, updates the state
//! mirror, resolves pending requests and notifies observers. Commands may be
//! issued from any task; their writes are serialised by the writer lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_protocol::{
    is_valid_channel_name, is_valid_nickname, ClientCodec, CodecError, Command, DecodedMessage,
    Event, Notification, Reply, ServerError, TIMESTAMP_FORMAT,
};
use parley_utils::{ConnectionErrorKind, ParleyError, Result};

use super::handler::{ChatObserver, ObserverId, ObserverList, ObserverRouting};
use super::pending::{Failure, PendingTable, ReplyReceiver, RequestKey, Resolution};
use crate::config::ClientConfig;
use crate::deferred::Deferred;
use crate::state::{Channel, Message, StateMirror, Target};

type Writer = FramedWrite<OwnedWriteHalf, ClientCodec>;
type Reader = FramedRead<OwnedReadHalf, ClientCodec>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone)]
struct Endpoint {
    host: String,
    port: u16,
    nick: String,
}

struct ClientInner {
    state: Mutex<ConnectionState>,
    endpoint: Mutex<Option<Endpoint>>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Stops the reader task of the current connection
    stop: Mutex<Option<CancellationToken>>,
    /// Set by `disconnect`; any other close is reported as a connection error
    closing: AtomicBool,
    pending: Mutex<PendingTable>,
    mirror: RwLock<StateMirror>,
    /// Server clock minus local clock, from the last `REPLY_TIME`
    clock_offset: Mutex<Duration>,
    observers: ObserverList,
    routing: ObserverRouting,
}

/// Connection to one chat server
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::with_routing(ObserverRouting::default())
    }
}

impl ChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ClientConfig) -> Self {
        Self::with_routing(config.routing())
    }

    pub fn with_routing(routing: ObserverRouting) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                state: Mutex::new(ConnectionState::Disconnected),
                endpoint: Mutex::new(None),
                writer: tokio::sync::Mutex::new(None),
                reader: Mutex::new(None),
                stop: Mutex::new(None),
                closing: AtomicBool::new(false),
                pending: Mutex::new(PendingTable::new()),
                mirror: RwLock::new(StateMirror::new()),
                clock_offset: Mutex::new(Duration::zero()),
                observers: ObserverList::new(),
                routing,
            }),
        }
    }

    // ==================== Observers ====================

    pub fn add_observer(&self, observer: Arc<dyn ChatObserver>) -> ObserverId {
        self.inner.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn nickname(&self) -> Option<String> {
        self.inner.endpoint.lock().as_ref().map(|e| e.nick.clone())
    }

    pub fn host(&self) -> Option<String> {
        self.inner.endpoint.lock().as_ref().map(|e| e.host.clone())
    }

    pub fn port(&self) -> Option<u16> {
        self.inner.endpoint.lock().as_ref().map(|e| e.port)
    }

    pub fn targets(&self) -> Vec<Target> {
        self.inner.mirror.read().targets()
    }

    pub fn target(&self, name: &str) -> Option<Target> {
        self.inner.mirror.read().target(name)
    }

    pub fn joined_channels(&self) -> Vec<String> {
        self.inner.mirror.read().joined_channels()
    }

    pub fn users(&self) -> Vec<String> {
        self.inner.mirror.read().users()
    }

    pub fn messages(&self, target: &str) -> Vec<Message> {
        self.inner.mirror.read().messages(target)
    }

    // ==================== Connect / Disconnect ====================

    /// Connect and register `nick`; completes once the server accepts the nickname
    pub async fn connect(&self, host: &str, port: u16, nick: &str) -> Result<()> {
        if port == 0 {
            return Err(ParleyError::invalid_input("Invalid port number: 0"));
        }
        if host.trim().is_empty() {
            return Err(ParleyError::invalid_input("Host must not be empty"));
        }
        if !is_valid_nickname(nick) {
            return Err(ParleyError::invalid_input(format!("Invalid nickname '{}'", nick)));
        }

        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                return Err(ParleyError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }
        self.inner.closing.store(false, Ordering::SeqCst);

        let stream = match open_stream(host, port).await {
            Ok(stream) => stream,
            Err(e) => {
                *self.inner.state.lock() = ConnectionState::Disconnected;
                warn!("Failed to connect to {}:{}: {}", host, port, e);
                let message = e.to_string();
                self.inner.observers.notify(|o| o.on_connection_error(&message));
                return Err(e);
            }
        };
        info!("Connected to {}:{}", host, port);

        let (read_half, write_half) = stream.into_split();
        *self.inner.endpoint.lock() = Some(Endpoint {
            host: host.to_string(),
            port,
            nick: nick.to_string(),
        });
        self.inner.mirror.write().clear();
        *self.inner.clock_offset.lock() = Duration::zero();
        *self.inner.writer.lock().await = Some(FramedWrite::new(write_half, ClientCodec::new()));

        let reader = FramedRead::new(read_half, ClientCodec::new());
        let stop = CancellationToken::new();
        *self.inner.stop.lock() = Some(stop.clone());
        let handle = tokio::spawn(read_loop(Arc::clone(&self.inner), reader, stop));
        *self.inner.reader.lock() = Some(handle);

        let welcome = self
            .request(RequestKey::Nick, Command::Nick(nick.to_string()))
            .await;
        let welcome = match welcome {
            Ok(rx) => await_resolution(rx, |r| match r {
                Resolution::Nick(text) => Some(text),
                _ => None,
            })
            .await,
            Err(e) => Err(e),
        };

        let text = match welcome {
            Ok(text) => text,
            Err(e) => {
                debug!("Registration as {} failed: {}", nick, e);
                if let Ok(closing) = self.disconnect().await {
                    let _ = closing.await;
                }
                return Err(e);
            }
        };

        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
            }
        }
        info!("{}", text);

        // Prime the clock offset for message timestamps
        if let Err(e) = self.track(RequestKey::Time, Command::Time).await {
            debug!("Initial TIME not sent: {}", e);
        }
        Ok(())
    }

    /// Send QUIT and close; the result completes when the reader has stopped
    ///
    /// The reader is stopped without waiting for the server to hang up.
    pub async fn disconnect(&self) -> Result<Deferred<()>> {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Disconnected {
                return Err(ParleyError::NotConnected);
            }
            *state = ConnectionState::Disconnecting;
        }
        self.inner.closing.store(true, Ordering::SeqCst);

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.send(Command::Quit).await {
                debug!("QUIT not delivered: {}", e);
            }
            if let Err(e) = writer.close().await {
                debug!("Error closing connection: {}", e);
            }
        }

        if let Some(stop) = self.inner.stop.lock().take() {
            stop.cancel();
        }
        let reader = self.inner.reader.lock().take();
        Ok(Deferred::new(async move {
            if let Some(handle) = reader {
                handle
                    .await
                    .map_err(|e| ParleyError::internal(format!("reader task failed: {}", e)))?;
            }
            Ok(())
        }))
    }

    // ==================== Commands ====================

    /// Join a channel; resolves with the channel after its member list is fetched
    pub async fn join_channel(&self, channel: &str) -> Result<Deferred<Channel>> {
        self.ensure_connected()?;
        check_channel(channel)?;

        let rx = self
            .request(RequestKey::Join(channel.into()), Command::Join(channel.into()))
            .await?;
        let client = self.clone();
        let channel = channel.to_string();

        Ok(Deferred::new(async move {
            await_resolution(rx, |r| matches!(r, Resolution::Joined).then_some(())).await?;
            let members = client.names_in_channel(&channel).await?.await?;

            let snapshot = client.target(&channel).and_then(|t| t.as_channel());
            Ok(snapshot.unwrap_or(Channel {
                name: channel,
                members,
            }))
        }))
    }

    pub async fn part_channel(&self, channel: &str) -> Result<Deferred<()>> {
        self.ensure_connected()?;
        check_channel(channel)?;

        let rx = self
            .request(RequestKey::Part(channel.into()), Command::Part(channel.into()))
            .await?;
        Ok(Deferred::new(await_resolution(rx, |r| {
            matches!(r, Resolution::Parted).then_some(())
        })))
    }

    /// Send a message to a channel or a user
    ///
    /// The server does not echo direct messages, so those are stored and
    /// delivered to observers locally before this returns.
    ///
    /// A PRIVMSG has no success reply, so the result completes as soon as the
    /// line is written. A later `ERROR` for it (unknown user or channel) goes
    /// to `on_server_error`.
    pub async fn send_message(&self, target: &str, body: &str) -> Result<Deferred<()>> {
        self.ensure_connected()?;
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(ParleyError::invalid_input(format!(
                "Invalid message target '{}'",
                target
            )));
        }
        if body.contains(['\r', '\n']) {
            return Err(ParleyError::invalid_input("Message must be a single line"));
        }

        self.track(
            RequestKey::Message(target.into()),
            Command::Privmsg {
                target: target.into(),
                body: body.into(),
            },
        )
        .await?;

        if !is_valid_channel_name(target) {
            let sender = self.nickname().unwrap_or_default();
            let message = self.inner.stamp(sender, target, body);
            self.inner.mirror.write().add_message(target, message.clone());
            self.inner.observers.notify(|o| o.on_message_received(&message));
        }
        Ok(Deferred::ready(Ok(())))
    }

    /// Sorted member list of a channel
    pub async fn names_in_channel(&self, channel: &str) -> Result<Deferred<Vec<String>>> {
        self.ensure_connected()?;
        check_channel(channel)?;

        let rx = self
            .request(RequestKey::Names(channel.into()), Command::Names(channel.into()))
            .await?;
        Ok(Deferred::new(await_resolution(rx, |r| match r {
            Resolution::Names(mut nicks) => {
                nicks.sort();
                Some(nicks)
            }
            _ => None,
        })))
    }

    /// Channels that currently exist on the server
    pub async fn offered_channels(&self) -> Result<Deferred<Vec<String>>> {
        self.ensure_connected()?;
        let rx = self.request(RequestKey::List, Command::List).await?;
        Ok(Deferred::new(await_resolution(rx, |r| match r {
            Resolution::List(channels) => Some(channels),
            _ => None,
        })))
    }

    pub async fn server_time(&self) -> Result<Deferred<NaiveDateTime>> {
        self.ensure_connected()?;
        let rx = self.request(RequestKey::Time, Command::Time).await?;
        Ok(Deferred::new(await_resolution(rx, |r| match r {
            Resolution::Time(time) => Some(time),
            _ => None,
        })))
    }

    pub async fn info(&self) -> Result<Deferred<String>> {
        self.ensure_connected()?;
        let rx = self.request(RequestKey::Info, Command::Info).await?;
        Ok(Deferred::new(await_resolution(rx, |r| match r {
            Resolution::Info(text) => Some(text),
            _ => None,
        })))
    }

    /// Round-trip `token` through the server
    pub async fn ping(&self, token: &str) -> Result<Deferred<String>> {
        self.ensure_connected()?;
        if token.is_empty() || token.starts_with(':') || token.contains(char::is_whitespace) {
            return Err(ParleyError::invalid_input(format!("Invalid ping token '{}'", token)));
        }

        let rx = self
            .request(RequestKey::Ping(token.into()), Command::Ping(token.into()))
            .await?;
        Ok(Deferred::new(await_resolution(rx, |r| match r {
            Resolution::Pong(token) => Some(token),
            _ => None,
        })))
    }

    // ==================== Writes ====================

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ParleyError::NotConnected)
        }
    }

    /// Write a command whose reply a caller will await
    async fn request(
        &self,
        key: RequestKey,
        command: Command,
    ) -> Result<ReplyReceiver> {
        let mut writer = self.inner.writer.lock().await;
        let framed = writer.as_mut().ok_or(ParleyError::NotConnected)?;

        let (id, rx) = self.inner.pending.lock().register(key);
        if let Err(e) = framed.send(command).await {
            self.inner.pending.lock().remove(id);
            return Err(write_error(e));
        }
        Ok(rx)
    }

    /// Write a command nobody awaits; its errors go to `on_server_error`
    async fn track(&self, key: RequestKey, command: Command) -> Result<()> {
        let mut writer = self.inner.writer.lock().await;
        let framed = writer.as_mut().ok_or(ParleyError::NotConnected)?;

        let id = self.inner.pending.lock().track(key);
        if let Err(e) = framed.send(command).await {
            self.inner.pending.lock().remove(id);
            return Err(write_error(e));
        }
        Ok(())
    }
}

impl fmt::Display for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.endpoint.lock().as_ref() {
            Some(e) => write!(f, "{} | {}:{}", e.nick, e.host, e.port),
            None => f.write_str("not connected"),
        }
    }
}

// ==================== Reader Task ====================

async fn read_loop(inner: Arc<ClientInner>, mut reader: Reader, stop: CancellationToken) {
    let failure = loop {
        tokio::select! {
            _ = stop.cancelled() => break None,
            next = reader.next() => match next {
                Some(Ok(message)) => inner.dispatch(message),
                Some(Err(CodecError::Io(e))) => break Some(ParleyError::connection(&e)),
                None => break None,
            },
        }
    };
    inner.teardown(failure).await;
}

impl ClientInner {
    fn own_nick(&self) -> Option<String> {
        self.endpoint.lock().as_ref().map(|e| e.nick.clone())
    }

    /// Build a message timestamped with the estimated server clock
    fn stamp(&self, sender: impl Into<String>, target: &str, body: &str) -> Message {
        let local = Local::now();
        let server_time = local.naive_local() + *self.clock_offset.lock();
        Message::new(sender, target, body, server_time, local)
    }

    /// Notify about an event another user caused, or our own one if routed
    fn notify_event(&self, own: bool, f: impl Fn(&dyn ChatObserver)) {
        if !own || self.routing.self_events {
            self.observers.notify(f);
        }
    }

    fn dispatch(&self, message: DecodedMessage) {
        match message {
            DecodedMessage::Notification(notification) => self.on_notification(notification),
            DecodedMessage::Reply(reply) => self.on_reply(reply),
            DecodedMessage::Malformed { line, reason } => {
                warn!("Ignoring malformed line {:?}: {}", line, reason);
            }
        }
    }

    fn on_notification(&self, notification: Notification) {
        let Notification { source, event } = notification;
        let own = self.own_nick().as_deref() == Some(source.as_str());

        match event {
            Event::Quit => {
                if own {
                    let mut state = self.state.lock();
                    if *state != ConnectionState::Disconnected {
                        *state = ConnectionState::Disconnecting;
                    }
                } else {
                    self.mirror.write().remove_user(&source);
                }
                self.notify_event(own, |o| o.on_quit(&source));
            }
            Event::Join { channel } => {
                if own {
                    self.mirror.write().join_channel(&channel, &source);
                    self.pending
                        .lock()
                        .resolve(&RequestKey::Join(channel.clone()), Resolution::Joined);
                } else {
                    self.mirror.write().add_member(&channel, &source);
                }
                self.notify_event(own, |o| o.on_join_channel(&source, &channel));
            }
            Event::Part { channel } => {
                if own {
                    self.mirror.write().remove_target(&channel);
                    self.pending
                        .lock()
                        .resolve(&RequestKey::Part(channel.clone()), Resolution::Parted);
                } else {
                    self.mirror.write().remove_member(&channel, &source);
                }
                self.notify_event(own, |o| o.on_part_channel(&source, &channel));
            }
            Event::Privmsg { target, body } => {
                let to_channel = is_valid_channel_name(&target);
                if own && to_channel {
                    self.pending.lock().confirm_message(&target);
                }

                let key = if to_channel { target.clone() } else { source.clone() };
                let message = self.stamp(source, &target, &body);
                self.mirror.write().add_message(&key, message.clone());
                self.observers.notify(|o| o.on_message_received(&message));
            }
        }
    }

    fn on_reply(&self, reply: Reply) {
        let resolved = match reply {
            Reply::Nick { text } => self
                .pending
                .lock()
                .resolve(&RequestKey::Nick, Resolution::Nick(text)),
            Reply::Names { channel, nicks } => {
                self.mirror.write().set_members(&channel, &nicks);
                self.pending
                    .lock()
                    .resolve(&RequestKey::Names(channel), Resolution::Names(nicks))
            }
            Reply::List { channels } => self
                .pending
                .lock()
                .resolve(&RequestKey::List, Resolution::List(channels)),
            Reply::Time { timestamp } => {
                match NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT) {
                    Ok(time) => {
                        *self.clock_offset.lock() = time - Local::now().naive_local();
                        self.pending
                            .lock()
                            .resolve(&RequestKey::Time, Resolution::Time(time))
                    }
                    Err(e) => {
                        warn!("Unreadable server time {:?}: {}", timestamp, e);
                        self.pending.lock().reject(
                            &RequestKey::Time,
                            ParleyError::protocol(format!("unreadable server time '{}'", timestamp)),
                        )
                    }
                }
            }
            Reply::Info { text } => self
                .pending
                .lock()
                .resolve(&RequestKey::Info, Resolution::Info(text)),
            Reply::Pong { token } => self
                .pending
                .lock()
                .resolve(&RequestKey::Ping(token.clone()), Resolution::Pong(token)),
            Reply::Error { message } => {
                let failure = self
                    .pending
                    .lock()
                    .fail(ServerError::from_message(&message), &message);
                if failure == Failure::Uncorrelated {
                    debug!("Uncorrelated server error: {}", message);
                    let text = ParleyError::server(message).to_string();
                    self.observers.notify(|o| o.on_server_error(&text));
                }
                true
            }
        };

        if !resolved {
            debug!("Reply with no pending request");
        }
    }

    /// Release the connection; `Disconnected` is published last so a new
    /// `connect` cannot start while this one is still being torn down
    async fn teardown(&self, failure: Option<ParleyError>) {
        self.writer.lock().await.take();
        self.stop.lock().take();
        {
            let mut pending = self.pending.lock();
            if !pending.is_empty() {
                debug!("Failing {} outstanding requests", pending.len());
            }
            pending.fail_all();
        }
        let expected = self.closing.load(Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Disconnected;

        if expected {
            if let Some(e) = failure {
                debug!("Read error while disconnecting: {}", e);
            }
            info!("Disconnected");
            return;
        }

        let error = failure.unwrap_or_else(|| {
            ParleyError::connection_kind(
                ConnectionErrorKind::UnexpectedEof,
                "server closed the connection",
            )
        });
        warn!("Connection lost: {}", error);
        let message = error.to_string();
        self.observers.notify(|o| o.on_connection_error(&message));
    }
}

// ==================== Helpers ====================

async fn open_stream(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ParleyError::connection_kind(ConnectionErrorKind::HostNotFound, e.to_string()))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => ParleyError::connection(&e),
        None => ParleyError::connection_kind(
            ConnectionErrorKind::HostNotFound,
            format!("no addresses for {}", host),
        ),
    })
}

async fn await_resolution<T>(
    rx: ReplyReceiver,
    extract: impl FnOnce(Resolution) -> Option<T>,
) -> Result<T> {
    let resolution = rx.await.map_err(|_| ParleyError::ConnectionClosed)??;
    extract(resolution).ok_or_else(|| ParleyError::internal("reply did not match its request"))
}

fn check_channel(channel: &str) -> Result<()> {
    if is_valid_channel_name(channel) {
        Ok(())
    } else {
        Err(ParleyError::invalid_input(format!(
            "Invalid channel name '{}'",
            channel
        )))
    }
}

fn write_error(error: CodecError) -> ParleyError {
    match error {
        CodecError::Io(e) => ParleyError::connection(&e),
    }
}
