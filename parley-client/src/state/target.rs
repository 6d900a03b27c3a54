//! Conversation endpoints: channels and direct-message peers

use std::collections::BTreeSet;

use parley_protocol::is_valid_channel_name;

use super::Message;

/// A channel or a direct-message peer, with its message history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    /// Mirrored member list; `None` for a user target
    members: Option<BTreeSet<String>>,
    /// Sorted ascending by server time
    messages: Vec<Message>,
}

impl Target {
    /// Create a target, a channel if `name` is channel-shaped
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let members = is_valid_channel_name(&name).then(BTreeSet::new);
        Self {
            name,
            members,
            messages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_channel(&self) -> bool {
        self.members.is_some()
    }

    /// Sorted member nicknames; empty for a user target
    pub fn members(&self) -> Vec<String> {
        self.members
            .as_ref()
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.as_ref().is_some_and(|m| m.contains(nick))
    }

    /// Messages, oldest first by server time
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Channel view of this target
    pub fn as_channel(&self) -> Option<Channel> {
        self.is_channel().then(|| Channel {
            name: self.name.clone(),
            members: self.members(),
        })
    }

    /// Insert keeping server-time order; equal timestamps keep arrival order
    pub(crate) fn add_message(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.server_time() <= message.server_time());
        self.messages.insert(at, message);
    }

    pub(crate) fn add_member(&mut self, nick: &str) {
        if let Some(members) = self.members.as_mut() {
            members.insert(nick.to_string());
        }
    }

    pub(crate) fn remove_member(&mut self, nick: &str) -> bool {
        self.members.as_mut().is_some_and(|m| m.remove(nick))
    }

    pub(crate) fn set_members(&mut self, nicks: impl IntoIterator<Item = String>) {
        if let Some(members) = self.members.as_mut() {
            *members = nicks.into_iter().collect();
        }
    }
}

/// Snapshot of a joined channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    /// Sorted member nicknames
    pub members: Vec<String>,
}
