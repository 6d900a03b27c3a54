//! Server information handlers
//!
//! Handles: TIME, INFO, PING

use chrono::Local;

use parley_protocol::{Reply, TIMESTAMP_FORMAT};

use super::{HandlerContext, HandlerOutcome, HandlerResult};

impl HandlerContext {
    /// Handle TIME - the server's local wall clock
    pub(crate) fn handle_time(&self) -> HandlerOutcome {
        self.registered_nick()?;
        let timestamp = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        Ok(HandlerResult::reply(Reply::Time { timestamp }))
    }

    /// Handle INFO - configured server description
    pub(crate) fn handle_info(&self) -> HandlerOutcome {
        self.registered_nick()?;
        Ok(HandlerResult::reply(Reply::Info {
            text: self.config.server.info_text.clone(),
        }))
    }

    /// Handle PING - echo the token, registered or not
    pub(crate) fn handle_ping(&self, token: String) -> HandlerOutcome {
        Ok(HandlerResult::reply(Reply::Pong { token }))
    }
}
