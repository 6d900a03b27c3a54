//! Protocol-level error types
//!
//! [`ServerError`] enumerates every text the server can put in an
//! `ERROR :<message>` reply, so both ends agree on the wording.

/// Canonical server error replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ServerError {
    #[error("Nick already taken")]
    NameInUse,

    #[error("Invalid nickname")]
    InvalidNickname,

    #[error("You are already registered")]
    AlreadyRegistered,

    #[error("You need to register first")]
    NotRegistered,

    #[error("Invalid channel name")]
    InvalidChannelName,

    #[error("No channel exists with that name")]
    NoSuchChannel,

    #[error("No user exists with that name")]
    NoSuchUser,

    #[error("Invalid arguments to PRIVMSG command")]
    InvalidPrivmsg,

    #[error("Unknown command")]
    UnknownCommand,
}

impl ServerError {
    const ALL: [ServerError; 9] = [
        ServerError::NameInUse,
        ServerError::InvalidNickname,
        ServerError::AlreadyRegistered,
        ServerError::NotRegistered,
        ServerError::InvalidChannelName,
        ServerError::NoSuchChannel,
        ServerError::NoSuchUser,
        ServerError::InvalidPrivmsg,
        ServerError::UnknownCommand,
    ];

    /// Recognise the text of an `ERROR` reply
    pub fn from_message(message: &str) -> Option<Self> {
        let message = message.trim();
        Self::ALL
            .into_iter()
            .find(|err| err.to_string() == message)
    }
}

/// Failure to parse a line received by the server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command line")]
    Empty,

    #[error("unknown command verb '{0}'")]
    UnknownVerb(String),

    #[error("PRIVMSG requires a target and a ':'-prefixed body")]
    InvalidPrivmsg,
}

impl CommandError {
    /// The error reply the server sends for this parse failure
    pub fn server_error(&self) -> ServerError {
        match self {
            CommandError::Empty | CommandError::UnknownVerb(_) => ServerError::UnknownCommand,
            CommandError::InvalidPrivmsg => ServerError::InvalidPrivmsg,
        }
    }
}
