//! Channel-related command handlers
//!
//! Handles: JOIN, PART, NAMES, LIST

use tracing::debug;

use parley_protocol::{is_valid_channel_name, Notification, Reply, ServerError};

use super::{HandlerContext, HandlerOutcome, HandlerResult};

impl HandlerContext {
    /// Handle JOIN - add the user, then announce it to the channel
    ///
    /// The joiner is a member by then, so it receives its own JOIN.
    pub(crate) fn handle_join(&self, channel: String) -> HandlerOutcome {
        let nick = self.registered_nick()?;
        self.registry.join_channel(&nick, &channel)?;
        self.registry
            .route_message(&channel, Notification::join(nick.as_str(), channel.as_str()).into())?;
        debug!("{} joined {}", nick, channel);
        Ok(HandlerResult::NoResponse)
    }

    /// Handle PART - announce to the channel, then remove the user
    ///
    /// The leaver is still a member while the PART is routed, so it receives
    /// its own PART.
    pub(crate) fn handle_part(&self, channel: String) -> HandlerOutcome {
        let nick = self.registered_nick()?;
        if !is_valid_channel_name(&channel) {
            return Err(ServerError::NoSuchChannel);
        }
        self.registry
            .route_message(&channel, Notification::part(nick.as_str(), channel.as_str()).into())?;
        self.registry.leave_channel(&nick, &channel)?;
        debug!("{} left {}", nick, channel);
        Ok(HandlerResult::NoResponse)
    }

    /// Handle NAMES - sorted members of one channel
    pub(crate) fn handle_names(&self, channel: String) -> HandlerOutcome {
        self.registered_nick()?;
        let mut nicks = self.registry.names_of(&channel)?;
        nicks.sort();
        Ok(HandlerResult::reply(Reply::Names { channel, nicks }))
    }

    /// Handle LIST - sorted names of all channels
    pub(crate) fn handle_list(&self) -> HandlerOutcome {
        self.registered_nick()?;
        let mut channels = self.registry.all_channel_names();
        channels.sort();
        Ok(HandlerResult::reply(Reply::List { channels }))
    }
}
