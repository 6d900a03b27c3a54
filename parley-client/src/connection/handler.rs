//! Observer trait and utilities
//!
//! Observers are invoked from the connection's reader task, in the order
//! lines arrive from the server. Implementations must return quickly; hand
//! work off to another task if it may block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::state::Message;

/// Trait for reacting to chat events
#[allow(unused_variables)]
pub trait ChatObserver: Send + Sync {
    /// A user quit the server
    fn on_quit(&self, nick: &str) {}

    /// A user joined a channel this client is in
    fn on_join_channel(&self, nick: &str, channel: &str) {}

    /// A user left a channel this client is in
    fn on_part_channel(&self, nick: &str, channel: &str) {}

    /// A chat message was received, or sent as a direct message
    fn on_message_received(&self, message: &Message) {}

    /// The connection failed or was lost
    fn on_connection_error(&self, message: &str) {}

    /// The server reported an error no pending request was waiting for
    fn on_server_error(&self, message: &str) {}
}

/// Which events reach observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverRouting {
    /// Deliver JOIN/PART/QUIT caused by this client itself
    pub self_events: bool,
}

/// Handle returned by [`ObserverList::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered observers
#[derive(Default)]
pub struct ObserverList {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<dyn ChatObserver>)>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn ChatObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Call `f` on every observer; the lock is released before any call
    pub fn notify(&self, f: impl Fn(&dyn ChatObserver)) {
        let snapshot: Vec<Arc<dyn ChatObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            f(observer.as_ref());
        }
    }
}

/// One observer callback as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Quit { nick: String },
    Joined { nick: String, channel: String },
    Parted { nick: String, channel: String },
    Message(Message),
    ConnectionError(String),
    ServerError(String),
}

/// Simple callback-based observer
pub struct CallbackObserver<F>
where
    F: Fn(ChatEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(ChatEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ChatObserver for CallbackObserver<F>
where
    F: Fn(ChatEvent) + Send + Sync,
{
    fn on_quit(&self, nick: &str) {
        (self.callback)(ChatEvent::Quit { nick: nick.into() });
    }

    fn on_join_channel(&self, nick: &str, channel: &str) {
        (self.callback)(ChatEvent::Joined {
            nick: nick.into(),
            channel: channel.into(),
        });
    }

    fn on_part_channel(&self, nick: &str, channel: &str) {
        (self.callback)(ChatEvent::Parted {
            nick: nick.into(),
            channel: channel.into(),
        });
    }

    fn on_message_received(&self, message: &Message) {
        (self.callback)(ChatEvent::Message(message.clone()));
    }

    fn on_connection_error(&self, message: &str) {
        (self.callback)(ChatEvent::ConnectionError(message.into()));
    }

    fn on_server_error(&self, message: &str) {
        (self.callback)(ChatEvent::ServerError(message.into()));
    }
}
