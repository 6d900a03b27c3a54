//! Chat messages held by the client

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};

/// One chat line, immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: String,
    target: String,
    body: String,
    server_time: NaiveDateTime,
    local_time: DateTime<Local>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        target: impl Into<String>,
        body: impl Into<String>,
        server_time: NaiveDateTime,
        local_time: DateTime<Local>,
    ) -> Self {
        Self {
            sender: sender.into(),
            target: target.into(),
            body: body.into(),
            server_time,
            local_time,
        }
    }

    /// Nickname of the author
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Channel or nickname the message was addressed to
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Server-side time of the message; the ordering key
    pub fn server_time(&self) -> NaiveDateTime {
        self.server_time
    }

    /// When this client saw the message, for display only
    pub fn local_time(&self) -> DateTime<Local> {
        self.local_time
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] <{}> {}",
            self.local_time.format("%H:%M:%S"),
            self.sender,
            self.body
        )
    }
}
