//! Client-side mirror of server state
//!
//! Only the connection's reader task writes here, in the order decoded
//! lines arrive. Readers get owned snapshots.

mod message;
mod target;

use std::collections::BTreeMap;

pub use message::Message;
pub use target::{Channel, Target};

/// Targets known to this client, keyed by name
#[derive(Debug, Default)]
pub struct StateMirror {
    targets: BTreeMap<String, Target>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    // ==================== Reads ====================

    pub fn targets(&self) -> Vec<Target> {
        self.targets.values().cloned().collect()
    }

    pub fn target(&self, name: &str) -> Option<Target> {
        self.targets.get(name).cloned()
    }

    /// Names of channels this client is in
    pub fn joined_channels(&self) -> Vec<String> {
        self.targets
            .values()
            .filter(|t| t.is_channel())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Names of direct-message peers
    pub fn users(&self) -> Vec<String> {
        self.targets
            .values()
            .filter(|t| !t.is_channel())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// History of one target, oldest first
    pub fn messages(&self, name: &str) -> Vec<Message> {
        self.targets
            .get(name)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    // ==================== Updates ====================

    /// Record our own join; the member list starts as just us
    pub fn join_channel(&mut self, channel: &str, own_nick: &str) {
        let target = self
            .targets
            .entry(channel.to_string())
            .or_insert_with(|| Target::new(channel));
        target.set_members([own_nick.to_string()]);
    }

    pub fn remove_target(&mut self, name: &str) -> Option<Target> {
        self.targets.remove(name)
    }

    /// Another user joined a channel we are in
    pub fn add_member(&mut self, channel: &str, nick: &str) {
        if let Some(target) = self.targets.get_mut(channel) {
            target.add_member(nick);
        }
    }

    /// Another user left a channel we are in
    pub fn remove_member(&mut self, channel: &str, nick: &str) {
        if let Some(target) = self.targets.get_mut(channel) {
            target.remove_member(nick);
        }
    }

    /// Overwrite a channel's member list; unknown channels are ignored
    pub fn set_members(&mut self, channel: &str, nicks: &[String]) {
        if let Some(target) = self.targets.get_mut(channel) {
            target.set_members(nicks.iter().cloned());
        }
    }

    /// A user quit: drop their conversation and every channel membership
    pub fn remove_user(&mut self, nick: &str) {
        self.targets.remove(nick);
        for target in self.targets.values_mut() {
            target.remove_member(nick);
        }
    }

    /// File a message under `key`, creating the target if needed
    pub fn add_message(&mut self, key: &str, message: Message) {
        self.targets
            .entry(key.to_string())
            .or_insert_with(|| Target::new(key))
            .add_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn message(sender: &str, target: &str, body: &str) -> Message {
        let now = Local::now();
        Message::new(sender, target, body, now.naive_local(), now)
    }

    #[test]
    fn test_join_and_members() {
        let mut mirror = StateMirror::new();
        mirror.join_channel("#a", "alice");
        mirror.add_member("#a", "bob");

        assert_eq!(mirror.joined_channels(), vec!["#a"]);
        assert_eq!(mirror.target("#a").unwrap().members(), vec!["alice", "bob"]);

        mirror.remove_member("#a", "bob");
        assert_eq!(mirror.target("#a").unwrap().members(), vec!["alice"]);
    }

    #[test]
    fn test_members_of_unknown_channel_ignored() {
        let mut mirror = StateMirror::new();
        mirror.add_member("#other", "bob");
        mirror.set_members("#other", &["bob".to_string()]);
        assert!(mirror.targets().is_empty());
    }

    #[test]
    fn test_set_members_overwrites() {
        let mut mirror = StateMirror::new();
        mirror.join_channel("#a", "alice");
        mirror.set_members("#a", &["bob".to_string(), "alice".to_string()]);
        assert_eq!(mirror.target("#a").unwrap().members(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_remove_user_everywhere() {
        let mut mirror = StateMirror::new();
        mirror.join_channel("#a", "alice");
        mirror.join_channel("#b", "alice");
        mirror.add_member("#a", "bob");
        mirror.add_member("#b", "bob");
        mirror.add_message("bob", message("bob", "alice", "hi"));

        mirror.remove_user("bob");

        assert!(mirror.target("bob").is_none());
        assert!(!mirror.target("#a").unwrap().has_member("bob"));
        assert!(!mirror.target("#b").unwrap().has_member("bob"));
    }

    #[test]
    fn test_add_message_creates_user_target() {
        let mut mirror = StateMirror::new();
        mirror.add_message("bob", message("bob", "alice", "hey"));

        assert_eq!(mirror.users(), vec!["bob"]);
        assert!(mirror.joined_channels().is_empty());
        assert_eq!(mirror.messages("bob").len(), 1);
        assert!(mirror.messages("nobody").is_empty());
    }

    #[test]
    fn test_rejoin_keeps_history() {
        let mut mirror = StateMirror::new();
        mirror.join_channel("#a", "alice");
        mirror.add_message("#a", message("bob", "#a", "one"));
        mirror.join_channel("#a", "alice");

        assert_eq!(mirror.messages("#a").len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut mirror = StateMirror::new();
        mirror.join_channel("#a", "alice");
        let snapshot = mirror.target("#a").unwrap();
        mirror.add_member("#a", "bob");

        assert_eq!(snapshot.members(), vec!["alice"]);
    }
}
