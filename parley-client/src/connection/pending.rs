//! Outstanding requests awaiting a server reply
//!
//! The server answers in request order, so every lookup walks the queue
//! oldest first. Each entry carries a correlation key and, when a caller is
//! waiting, the sender half of its deferred result.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use parley_protocol::{is_valid_channel_name, ServerError};
use parley_utils::{ParleyError, Result};
use tokio::sync::oneshot;

/// Monotonically increasing request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// What a request is waiting for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Nick,
    Join(String),
    Part(String),
    Names(String),
    List,
    Time,
    Info,
    Ping(String),
    /// A sent PRIVMSG; it has no success reply
    Message(String),
}

impl RequestKey {
    fn same_kind(&self, other: &RequestKey) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Whether a server error with this text could answer this request
    fn could_fail_with(&self, error: Option<ServerError>) -> bool {
        use RequestKey::*;
        match error {
            Some(
                ServerError::NameInUse
                | ServerError::InvalidNickname
                | ServerError::AlreadyRegistered,
            ) => matches!(self, Nick),
            Some(ServerError::InvalidChannelName) => matches!(self, Join(_)),
            Some(ServerError::NoSuchChannel) => match self {
                Part(_) | Names(_) => true,
                Message(target) => is_valid_channel_name(target),
                _ => false,
            },
            Some(ServerError::NoSuchUser) => {
                matches!(self, Message(target) if !is_valid_channel_name(target))
            }
            Some(ServerError::InvalidPrivmsg) => matches!(self, Message(_)),
            Some(ServerError::NotRegistered | ServerError::UnknownCommand) | None => true,
        }
    }
}

/// Value a reply hands back to the waiting caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Nick(String),
    Joined,
    Parted,
    Names(Vec<String>),
    List(Vec<String>),
    Time(NaiveDateTime),
    Info(String),
    Pong(String),
}

/// Receiving half of a waiting caller's result
pub type ReplyReceiver = oneshot::Receiver<Result<Resolution>>;

/// Where a server error ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A waiting caller received the error
    Correlated,
    /// No caller is waiting for it
    Uncorrelated,
}

#[derive(Debug)]
struct PendingRequest {
    id: RequestId,
    key: RequestKey,
    tx: Option<oneshot::Sender<Result<Resolution>>>,
}

impl PendingRequest {
    fn complete(self, result: Result<Resolution>) -> bool {
        match self.tx {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

/// Request queue in send order
#[derive(Debug, Default)]
pub struct PendingTable {
    next_id: u64,
    entries: VecDeque<PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, key: RequestKey, tx: Option<oneshot::Sender<Result<Resolution>>>) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.entries.push_back(PendingRequest { id, key, tx });
        id
    }

    /// Queue a request a caller will await
    pub fn register(&mut self, key: RequestKey) -> (RequestId, ReplyReceiver) {
        let (tx, rx) = oneshot::channel();
        (self.push(key, Some(tx)), rx)
    }

    /// Queue a request only so its reply or error can be correlated
    pub fn track(&mut self, key: RequestKey) -> RequestId {
        self.push(key, None)
    }

    /// Drop a request whose line never reached the server
    pub fn remove(&mut self, id: RequestId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Locate the oldest entry for `key`, falling back to the oldest of the same kind
    fn find(&self, key: &RequestKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.key == key)
            .or_else(|| self.entries.iter().position(|e| e.key.same_kind(key)))
    }

    /// Take the entry at `index`; sent messages queued before it were accepted
    fn take(&mut self, index: usize) -> Option<PendingRequest> {
        let entry = self.entries.remove(index)?;
        let id = entry.id;
        self.entries
            .retain(|e| e.id > id || !matches!(e.key, RequestKey::Message(_)));
        Some(entry)
    }

    /// Complete the oldest request matching `key`; false if none was queued
    pub fn resolve(&mut self, key: &RequestKey, resolution: Resolution) -> bool {
        self.settle(key, Ok(resolution))
    }

    /// Fail the oldest request matching `key` with a local error
    pub fn reject(&mut self, key: &RequestKey, error: ParleyError) -> bool {
        self.settle(key, Err(error))
    }

    fn settle(&mut self, key: &RequestKey, result: Result<Resolution>) -> bool {
        let Some(entry) = self.find(key).and_then(|index| self.take(index)) else {
            return false;
        };
        entry.complete(result);
        true
    }

    /// Route an `ERROR` reply to the oldest request that could have caused it
    ///
    /// Awaited requests are tried before fire-and-forget ones.
    pub fn fail(&mut self, error: Option<ServerError>, text: &str) -> Failure {
        let candidate = |e: &PendingRequest| e.key.could_fail_with(error);
        let Some(index) = self
            .entries
            .iter()
            .position(|e| e.tx.is_some() && candidate(e))
            .or_else(|| self.entries.iter().position(candidate))
        else {
            return Failure::Uncorrelated;
        };

        match self.entries.remove(index) {
            Some(entry) => {
                if entry.complete(Err(ParleyError::server(text))) {
                    Failure::Correlated
                } else {
                    Failure::Uncorrelated
                }
            }
            None => Failure::Uncorrelated,
        }
    }

    /// A channel echo proves the oldest message to `target` was accepted
    pub fn confirm_message(&mut self, target: &str) -> bool {
        match self
            .entries
            .iter()
            .position(|e| matches!(&e.key, RequestKey::Message(t) if t == target))
        {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Fail every outstanding request; the connection is gone
    pub fn fail_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.complete(Err(ParleyError::ConnectionClosed));
        }
    }
}
