//! Registration handlers
//!
//! Handles: NICK, QUIT, and connection teardown

use tracing::{info, warn};

use parley_protocol::{is_valid_nickname, Notification, Reply, ServerError};

use super::{HandlerContext, HandlerOutcome, HandlerResult, SessionState};

impl HandlerContext {
    /// Handle NICK - register this connection under a nickname
    pub(crate) fn handle_nick(&mut self, nick: String) -> HandlerOutcome {
        if !is_valid_nickname(&nick) {
            return Err(ServerError::InvalidNickname);
        }
        if self.state != SessionState::Unregistered {
            return Err(ServerError::AlreadyRegistered);
        }

        self.registry.register_user(&nick, self.sink.clone())?;
        info!("{} registered as {}", self.client_id, nick);

        let text = format!("Welcome to the IRC network, {}", nick);
        self.state = SessionState::Registered { nick };
        Ok(HandlerResult::reply(Reply::Nick { text }))
    }

    /// Handle QUIT - accepted in every state
    pub(crate) fn handle_quit(&mut self) -> HandlerOutcome {
        self.handle_disconnect();
        Ok(HandlerResult::Close)
    }

    /// Leave the registry, telling every user first
    ///
    /// Called on QUIT and when the socket ends. Safe to call more than once.
    pub fn handle_disconnect(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Registered { nick } = previous {
            self.registry.broadcast_all(Notification::quit(nick.as_str()).into());
            if let Err(e) = self.registry.remove_user(&nick) {
                warn!("{} could not remove {}: {}", self.client_id, nick, e);
            }
            info!("{} ({}) left", self.client_id, nick);
        }
    }
}
