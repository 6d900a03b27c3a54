//! Command handlers for one client connection
//!
//! This module routes decoded [`Command`]s to the handler for their verb and
//! turns the outcome into what the connection loop writes back. Replies to the
//! issuing client come back as a [`HandlerResult`]; notifications for other
//! users are delivered through the registry.

mod channel;
mod info;
mod messaging;
mod registration;

use std::sync::Arc;

use tracing::debug;

use parley_protocol::{Command, CommandError, Reply, ServerError, ServerMessage};

use crate::config::ServerConfig;
use crate::registry::{ClientId, Registry, Sink};

/// Registration state of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no nickname yet
    Unregistered,
    /// Registered under `nick`
    Registered { nick: String },
    /// Removed from the registry; the connection is closing
    Closed,
}

/// Context for command handlers
///
/// Owns the per-connection state and the handles into shared server state.
pub struct HandlerContext {
    /// Users and channels
    pub registry: Arc<Registry>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// The connection this context serves
    pub client_id: ClientId,
    /// This connection's own outbound queue, handed to the registry on NICK
    sink: Sink,
    state: SessionState,
}

/// Result of handling a command
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Single response to send back to the client
    Response(ServerMessage),
    /// Nothing to send directly (any output went through the registry)
    NoResponse,
    /// Stop serving this connection
    Close,
}

impl HandlerResult {
    pub fn reply(reply: Reply) -> Self {
        HandlerResult::Response(ServerMessage::Reply(reply))
    }

    pub fn error(err: ServerError) -> Self {
        Self::reply(Reply::error(err))
    }
}

/// Handlers return the server error to report on failure
pub(crate) type HandlerOutcome = Result<HandlerResult, ServerError>;

impl HandlerContext {
    /// Create a new handler context
    pub fn new(
        registry: Arc<Registry>,
        config: Arc<ServerConfig>,
        client_id: ClientId,
        sink: Sink,
    ) -> Self {
        Self {
            registry,
            config,
            client_id,
            sink,
            state: SessionState::Unregistered,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Nickname, once registered
    pub fn nick(&self) -> Option<&str> {
        match &self.state {
            SessionState::Registered { nick } => Some(nick),
            _ => None,
        }
    }

    /// Route a decoded command to the appropriate handler
    pub fn route_message(&mut self, command: Command) -> HandlerResult {
        let verb = command.verb();
        let outcome = match command {
            // Registration handlers
            Command::Nick(nick) => self.handle_nick(nick),
            Command::Quit => self.handle_quit(),

            // Channel handlers
            Command::Join(channel) => self.handle_join(channel),
            Command::Part(channel) => self.handle_part(channel),
            Command::Names(channel) => self.handle_names(channel),
            Command::List => self.handle_list(),

            // Messaging handlers
            Command::Privmsg { target, body } => self.handle_privmsg(target, body),

            // Server information handlers
            Command::Time => self.handle_time(),
            Command::Info => self.handle_info(),
            Command::Ping(token) => self.handle_ping(token),
        };

        outcome.unwrap_or_else(|err| {
            debug!("{} {} failed: {}", self.client_id, verb, err);
            HandlerResult::error(err)
        })
    }

    /// Reply to a line that did not parse as a command
    pub fn handle_parse_error(&self, err: &CommandError) -> HandlerResult {
        debug!("{} sent an unparseable line: {}", self.client_id, err);
        let reply = match err {
            // PRIVMSG is a real command, so registration is checked first
            CommandError::InvalidPrivmsg if self.nick().is_none() => ServerError::NotRegistered,
            other => other.server_error(),
        };
        HandlerResult::error(reply)
    }

    /// Nickname of a registered connection, or `NotRegistered`
    pub(crate) fn registered_nick(&self) -> Result<String, ServerError> {
        self.nick()
            .map(str::to_string)
            .ok_or(ServerError::NotRegistered)
    }
}
