//! User and Channel Registry
//!
//! The server's authoritative directory of registered users and the channels
//! they belong to. Every connection handler shares one [`Registry`]. Each
//! operation runs under a single lock, so multi-step updates (leaving every
//! channel on quit, pruning emptied channels) look atomic to other handlers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use parley_protocol::{is_valid_channel_name, is_valid_nickname, ServerError, ServerMessage};

/// Outbound queue of one connection
pub type Sink = mpsc::Sender<ServerMessage>;

/// Unique connection identifier, used for log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a new ClientId from a raw value (mainly for testing)
    #[cfg(test)]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

/// Registry operation failure
///
/// Each variant renders as the text the server puts in its `ERROR` reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{}", ServerError::NameInUse)]
    NameInUse,

    #[error("{}", ServerError::InvalidNickname)]
    InvalidNickname,

    #[error("{}", ServerError::InvalidChannelName)]
    InvalidChannelName,

    #[error("{}", ServerError::NotRegistered)]
    NotRegistered,

    #[error("{}", ServerError::NoSuchChannel)]
    NoSuchChannel,

    #[error("{}", no_such_target(.0))]
    NoSuchTarget(String),
}

fn no_such_target(target: &str) -> ServerError {
    if is_valid_channel_name(target) {
        ServerError::NoSuchChannel
    } else {
        ServerError::NoSuchUser
    }
}

impl RegistryError {
    /// Protocol error text for this failure
    pub fn server_error(&self) -> ServerError {
        match self {
            RegistryError::NameInUse => ServerError::NameInUse,
            RegistryError::InvalidNickname => ServerError::InvalidNickname,
            RegistryError::InvalidChannelName => ServerError::InvalidChannelName,
            RegistryError::NotRegistered => ServerError::NotRegistered,
            RegistryError::NoSuchChannel => ServerError::NoSuchChannel,
            RegistryError::NoSuchTarget(target) => no_such_target(target),
        }
    }
}

impl From<RegistryError> for ServerError {
    fn from(err: RegistryError) -> Self {
        err.server_error()
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Default)]
struct RegistryInner {
    /// Nickname -> outbound queue
    users: HashMap<String, Sink>,
    /// Channel name -> member nicknames
    channels: HashMap<String, HashSet<String>>,
}

impl RegistryInner {
    fn deliver(&self, nick: &str, message: &ServerMessage) {
        if let Some(sink) = self.users.get(nick) {
            deliver(nick, sink, message.clone());
        }
    }

    /// Remove `nick` from `channel`, deleting the channel once empty
    fn leave(&mut self, nick: &str, channel: &str) {
        let emptied = match self.channels.get_mut(channel) {
            Some(members) => {
                members.remove(nick);
                members.is_empty()
            }
            None => false,
        };

        if emptied {
            self.channels.remove(channel);
            info!("Deleting channel {}", channel);
        }
    }
}

fn deliver(nick: &str, sink: &Sink, message: ServerMessage) {
    match sink.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            warn!("Outbound queue for {} is full, dropping: {}", nick, dropped);
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Outbound queue for {} is closed", nick);
        }
    }
}

/// Registry of all registered users and live channels
///
/// Thread-safe for concurrent access from multiple connection handler tasks.
/// Every public operation takes the lock once and never awaits while holding it.
pub struct Registry {
    inner: Mutex<RegistryInner>,
    /// Counter for generating unique client IDs
    next_client_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Registry")
            .field("users", &inner.users.len())
            .field("channels", &inner.channels.len())
            .finish()
    }
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Allocate an identifier for a newly accepted connection
    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst))
    }

    // ==================== Users ====================

    /// Register `nick`, delivering its traffic to `sink`
    pub fn register_user(&self, nick: &str, sink: Sink) -> RegistryResult<()> {
        if !is_valid_nickname(nick) {
            return Err(RegistryError::InvalidNickname);
        }

        let mut inner = self.inner.lock();
        if inner.users.contains_key(nick) {
            return Err(RegistryError::NameInUse);
        }
        inner.users.insert(nick.to_string(), sink);
        debug!("Registered user {}", nick);
        Ok(())
    }

    /// Remove `nick` from every channel and then from the registry
    pub fn remove_user(&self, nick: &str) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        if !inner.users.contains_key(nick) {
            return Err(RegistryError::NotRegistered);
        }

        let joined: Vec<String> = inner
            .channels
            .iter()
            .filter(|(_, members)| members.contains(nick))
            .map(|(name, _)| name.clone())
            .collect();
        for channel in joined {
            inner.leave(nick, &channel);
        }

        inner.users.remove(nick);
        debug!("Removed user {}", nick);
        Ok(())
    }

    pub fn is_registered(&self, nick: &str) -> bool {
        self.inner.lock().users.contains_key(nick)
    }

    // ==================== Channels ====================

    /// Add `nick` to `channel`, creating the channel if needed
    pub fn join_channel(&self, nick: &str, channel: &str) -> RegistryResult<()> {
        if !is_valid_channel_name(channel) {
            return Err(RegistryError::InvalidChannelName);
        }

        let mut inner = self.inner.lock();
        if !inner.users.contains_key(nick) {
            return Err(RegistryError::NotRegistered);
        }

        if !inner.channels.contains_key(channel) {
            info!("Creating new channel {}", channel);
        }
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(nick.to_string());
        Ok(())
    }

    /// Remove `nick` from `channel`; the channel is deleted once empty
    pub fn leave_channel(&self, nick: &str, channel: &str) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        if !inner.channels.contains_key(channel) {
            return Err(RegistryError::NoSuchChannel);
        }
        if !inner.users.contains_key(nick) {
            return Err(RegistryError::NotRegistered);
        }

        inner.leave(nick, channel);
        Ok(())
    }

    // ==================== Delivery ====================

    /// Deliver `message` to a channel's members or to a single user
    ///
    /// Channel-shaped targets go to every current member; anything else is
    /// treated as a nickname.
    pub fn route_message(&self, target: &str, message: ServerMessage) -> RegistryResult<()> {
        let inner = self.inner.lock();

        if is_valid_channel_name(target) {
            let members = inner
                .channels
                .get(target)
                .ok_or_else(|| RegistryError::NoSuchTarget(target.to_string()))?;
            for nick in members {
                inner.deliver(nick, &message);
            }
            Ok(())
        } else {
            let sink = inner
                .users
                .get(target)
                .ok_or_else(|| RegistryError::NoSuchTarget(target.to_string()))?;
            deliver(target, sink, message);
            Ok(())
        }
    }

    /// Deliver `message` to every registered user
    pub fn broadcast_all(&self, message: ServerMessage) {
        let inner = self.inner.lock();
        for (nick, sink) in &inner.users {
            deliver(nick, sink, message.clone());
        }
    }

    // ==================== Snapshots ====================

    /// Members of `channel`, unordered
    pub fn names_of(&self, channel: &str) -> RegistryResult<Vec<String>> {
        self.inner
            .lock()
            .channels
            .get(channel)
            .map(|members| members.iter().cloned().collect())
            .ok_or(RegistryError::NoSuchChannel)
    }

    /// Names of all live channels, unordered
    pub fn all_channel_names(&self) -> Vec<String> {
        self.inner.lock().channels.keys().cloned().collect()
    }

    /// Nicknames of all registered users, unordered
    pub fn all_nicknames(&self) -> Vec<String> {
        self.inner.lock().users.keys().cloned().collect()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::Notification;
    use std::sync::Arc;

    fn sink() -> (Sink, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(16)
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            lines.push(msg.to_string());
        }
        lines
    }

    // ==================== Registration Tests ====================

    #[test]
    fn test_register_user() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        registry.register_user("alice", tx).unwrap();

        assert!(registry.is_registered("alice"));
        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.all_nicknames(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_register_duplicate_nick() {
        let registry = Registry::new();
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();
        registry.register_user("alice", tx1).unwrap();

        assert_eq!(
            registry.register_user("alice", tx2),
            Err(RegistryError::NameInUse)
        );
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn test_register_invalid_nick() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        assert_eq!(
            registry.register_user("9lives", tx),
            Err(RegistryError::InvalidNickname)
        );
    }

    #[test]
    fn test_concurrent_registration_one_winner() {
        for _ in 0..50 {
            let registry = Arc::new(Registry::new());
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    std::thread::spawn(move || {
                        let (tx, _rx) = mpsc::channel(1);
                        registry.register_user("racer", tx)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let ok = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(ok, 1);
            assert!(results.contains(&Err(RegistryError::NameInUse)));
        }
    }

    // ==================== Channel Tests ====================

    #[test]
    fn test_join_creates_channel() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        registry.register_user("alice", tx).unwrap();
        registry.join_channel("alice", "#rust").unwrap();

        assert_eq!(registry.all_channel_names(), vec!["#rust".to_string()]);
        assert_eq!(registry.names_of("#rust").unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_join_twice_is_single_membership() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        registry.register_user("alice", tx).unwrap();
        registry.join_channel("alice", "#rust").unwrap();
        registry.join_channel("alice", "#rust").unwrap();

        assert_eq!(registry.names_of("#rust").unwrap().len(), 1);
    }

    #[test]
    fn test_join_errors() {
        let registry = Registry::new();
        assert_eq!(
            registry.join_channel("alice", "rust"),
            Err(RegistryError::InvalidChannelName)
        );
        assert_eq!(
            registry.join_channel("ghost", "#rust"),
            Err(RegistryError::NotRegistered)
        );
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_sole_member_part_deletes_channel() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        registry.register_user("alice", tx).unwrap();
        registry.join_channel("alice", "#x").unwrap();
        registry.leave_channel("alice", "#x").unwrap();

        assert!(!registry.all_channel_names().contains(&"#x".to_string()));
        assert_eq!(registry.names_of("#x"), Err(RegistryError::NoSuchChannel));
    }

    #[test]
    fn test_leave_errors() {
        let registry = Registry::new();
        let (tx, _rx) = sink();
        registry.register_user("alice", tx).unwrap();
        registry.join_channel("alice", "#x").unwrap();

        assert_eq!(
            registry.leave_channel("alice", "#nope"),
            Err(RegistryError::NoSuchChannel)
        );
        assert_eq!(
            registry.leave_channel("ghost", "#x"),
            Err(RegistryError::NotRegistered)
        );
    }

    #[test]
    fn test_remove_user_cleans_all_channels() {
        let registry = Registry::new();
        let (a, _ra) = sink();
        let (b, _rb) = sink();
        registry.register_user("alice", a).unwrap();
        registry.register_user("bob", b).unwrap();
        registry.join_channel("alice", "#a").unwrap();
        registry.join_channel("alice", "#b").unwrap();
        registry.join_channel("bob", "#b").unwrap();

        registry.remove_user("alice").unwrap();

        assert!(!registry.is_registered("alice"));
        assert_eq!(registry.all_channel_names(), vec!["#b".to_string()]);
        assert_eq!(registry.names_of("#b").unwrap(), vec!["bob".to_string()]);
    }

    #[test]
    fn test_remove_unknown_user() {
        let registry = Registry::new();
        assert_eq!(registry.remove_user("ghost"), Err(RegistryError::NotRegistered));
    }

    // ==================== Routing Tests ====================

    #[test]
    fn test_route_to_channel_reaches_every_member() {
        let registry = Registry::new();
        let (a, mut ra) = sink();
        let (b, mut rb) = sink();
        let (c, mut rc) = sink();
        registry.register_user("alice", a).unwrap();
        registry.register_user("bob", b).unwrap();
        registry.register_user("carol", c).unwrap();
        registry.join_channel("alice", "#a").unwrap();
        registry.join_channel("bob", "#a").unwrap();

        registry
            .route_message("#a", Notification::privmsg("bob", "#a", "hi").into())
            .unwrap();

        assert_eq!(drain(&mut ra), vec![":bob PRIVMSG #a :hi"]);
        assert_eq!(drain(&mut rb), vec![":bob PRIVMSG #a :hi"]);
        assert!(drain(&mut rc).is_empty());
    }

    #[test]
    fn test_route_to_user_reaches_only_them() {
        let registry = Registry::new();
        let (a, mut ra) = sink();
        let (b, mut rb) = sink();
        registry.register_user("alice", a).unwrap();
        registry.register_user("bob", b).unwrap();

        registry
            .route_message("bob", Notification::privmsg("alice", "bob", "psst").into())
            .unwrap();

        assert!(drain(&mut ra).is_empty());
        assert_eq!(drain(&mut rb), vec![":alice PRIVMSG bob :psst"]);
    }

    #[test]
    fn test_route_to_missing_target() {
        let registry = Registry::new();
        let msg: ServerMessage = Notification::quit("x").into();

        let err = registry.route_message("#void", msg.clone()).unwrap_err();
        assert_eq!(err, RegistryError::NoSuchTarget("#void".into()));
        assert_eq!(err.to_string(), "No channel exists with that name");

        let err = registry.route_message("nobody", msg).unwrap_err();
        assert_eq!(err.to_string(), "No user exists with that name");
        assert_eq!(err.server_error(), ServerError::NoSuchUser);
    }

    #[test]
    fn test_broadcast_all() {
        let registry = Registry::new();
        let (a, mut ra) = sink();
        let (b, mut rb) = sink();
        registry.register_user("alice", a).unwrap();
        registry.register_user("bob", b).unwrap();

        registry.broadcast_all(Notification::quit("alice").into());

        assert_eq!(drain(&mut ra), vec![":alice QUIT"]);
        assert_eq!(drain(&mut rb), vec![":alice QUIT"]);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register_user("slow", tx).unwrap();

        for i in 0..3 {
            registry
                .route_message("slow", Notification::privmsg("x", "slow", i.to_string()).into())
                .unwrap();
        }

        assert_eq!(drain(&mut rx), vec![":x PRIVMSG slow :0"]);
    }

    #[test]
    fn test_closed_sink_is_ignored() {
        let registry = Registry::new();
        let (tx, rx) = sink();
        registry.register_user("gone", tx).unwrap();
        drop(rx);

        assert!(registry
            .route_message("gone", Notification::quit("x").into())
            .is_ok());
    }

    #[test]
    fn test_snapshots_sortable() {
        let registry = Registry::new();
        for nick in ["carol", "alice", "bob"] {
            let (tx, _rx) = sink();
            registry.register_user(nick, tx).unwrap();
            registry.join_channel(nick, "#all").unwrap();
        }

        assert_eq!(sorted(registry.names_of("#all").unwrap()), vec!["alice", "bob", "carol"]);
        assert_eq!(sorted(registry.all_nicknames()), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_client_ids_are_unique() {
        let registry = Registry::new();
        let a = registry.next_client_id();
        let b = registry.next_client_id();
        assert_ne!(a, b);
        assert_eq!(ClientId::new(a.value()), a);
    }
}
