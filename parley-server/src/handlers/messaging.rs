//! Message delivery handler
//!
//! Handles: PRIVMSG

use parley_protocol::Notification;

use super::{HandlerContext, HandlerOutcome, HandlerResult};

impl HandlerContext {
    /// Handle PRIVMSG - route to a channel or a single user
    ///
    /// Channel members (the sender included, when a member) get the line; a
    /// direct message goes to the recipient only.
    pub(crate) fn handle_privmsg(&self, target: String, body: String) -> HandlerOutcome {
        let nick = self.registered_nick()?;
        let line = Notification::privmsg(nick, target.as_str(), body);
        self.registry.route_message(&target, line.into())?;
        Ok(HandlerResult::NoResponse)
    }
}
