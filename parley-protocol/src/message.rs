//! Lines sent from the server to a client
//!
//! A server line is either a [`Notification`] about another actor (it starts
//! with `:<nick>`) or a [`Reply`] to a command issued by the receiving
//! client. `Display` produces the wire form and [`decode`] reads it back.
//! Decoding never fails: a line that fits neither shape comes back as
//! [`DecodedMessage::Malformed`].

use std::fmt;

/// Marker that starts a notification and a trailing field
const TRAILING_MARKER: char = ':';

/// `strftime` layout of the `REPLY_TIME` timestamp (ISO-8601 local, no zone)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// What another actor did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Quit,
    Join { channel: String },
    Part { channel: String },
    Privmsg { target: String, body: String },
}

/// A line pushed by the server describing an actor's action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Nickname of the actor
    pub source: String,
    pub event: Event,
}

impl Notification {
    pub fn new(source: impl Into<String>, event: Event) -> Self {
        Self {
            source: source.into(),
            event,
        }
    }

    pub fn quit(source: impl Into<String>) -> Self {
        Self::new(source, Event::Quit)
    }

    pub fn join(source: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::new(
            source,
            Event::Join {
                channel: channel.into(),
            },
        )
    }

    pub fn part(source: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::new(
            source,
            Event::Part {
                channel: channel.into(),
            },
        )
    }

    pub fn privmsg(
        source: impl Into<String>,
        target: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(
            source,
            Event::Privmsg {
                target: target.into(),
                body: body.into(),
            },
        )
    }

    pub fn verb(&self) -> &'static str {
        match self.event {
            Event::Quit => "QUIT",
            Event::Join { .. } => "JOIN",
            Event::Part { .. } => "PART",
            Event::Privmsg { .. } => "PRIVMSG",
        }
    }

    /// Channel or nickname the event is addressed to, if any
    pub fn target(&self) -> Option<&str> {
        match &self.event {
            Event::Quit => None,
            Event::Join { channel } | Event::Part { channel } => Some(channel),
            Event::Privmsg { target, .. } => Some(target),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match &self.event {
            Event::Privmsg { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{} {}", self.source, self.verb())?;
        match &self.event {
            Event::Quit => Ok(()),
            Event::Join { channel } | Event::Part { channel } => write!(f, " {}", channel),
            Event::Privmsg { target, body } => write!(f, " {} :{}", target, body),
        }
    }
}

/// A server response correlated to one client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `REPLY_NICK :<text>`
    Nick { text: String },
    /// `REPLY_NAMES <#channel> :<nicks>`
    Names { channel: String, nicks: Vec<String> },
    /// `REPLY_LIST :<channels>`
    List { channels: Vec<String> },
    /// `REPLY_TIME :<timestamp>`
    Time { timestamp: String },
    /// `REPLY_INFO :<text>`
    Info { text: String },
    /// `PONG <token>`
    Pong { token: String },
    /// `ERROR :<message>`
    Error { message: String },
}

impl Reply {
    /// Reply code token
    pub fn code(&self) -> &'static str {
        match self {
            Reply::Nick { .. } => "REPLY_NICK",
            Reply::Names { .. } => "REPLY_NAMES",
            Reply::List { .. } => "REPLY_LIST",
            Reply::Time { .. } => "REPLY_TIME",
            Reply::Info { .. } => "REPLY_INFO",
            Reply::Pong { .. } => "PONG",
            Reply::Error { .. } => "ERROR",
        }
    }

    /// Everything after the code, as it appears on the wire
    pub fn content(&self) -> String {
        match self {
            Reply::Nick { text } | Reply::Info { text } => format!(":{}", text),
            Reply::Names { channel, nicks } => format!("{} :{}", channel, nicks.join(" ")),
            Reply::List { channels } => format!(":{}", channels.join(" ")),
            Reply::Time { timestamp } => format!(":{}", timestamp),
            Reply::Pong { token } => token.clone(),
            Reply::Error { message } => format!(":{}", message),
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Reply::Error {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.content())
    }
}

/// Anything the server writes to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Notification(Notification),
    Reply(Reply),
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        ServerMessage::Notification(notification)
    }
}

impl From<Reply> for ServerMessage {
    fn from(reply: Reply) -> Self {
        ServerMessage::Reply(reply)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Notification(n) => n.fmt(f),
            ServerMessage::Reply(r) => r.fmt(f),
        }
    }
}

/// Result of decoding one server line on the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    Notification(Notification),
    Reply(Reply),
    Malformed { line: String, reason: String },
}

impl From<ServerMessage> for DecodedMessage {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Notification(n) => DecodedMessage::Notification(n),
            ServerMessage::Reply(r) => DecodedMessage::Reply(r),
        }
    }
}

/// Decode one line received from the server
pub fn decode(line: &str) -> DecodedMessage {
    let line = line.trim_end_matches(['\r', '\n']);
    let parsed = if line.starts_with(TRAILING_MARKER) {
        decode_notification(line).map(DecodedMessage::Notification)
    } else {
        decode_reply(line).map(DecodedMessage::Reply)
    };

    parsed.unwrap_or_else(|reason| DecodedMessage::Malformed {
        line: line.to_string(),
        reason,
    })
}

fn decode_notification(line: &str) -> Result<Notification, String> {
    let mut fields = Fields::new(&line[TRAILING_MARKER.len_utf8()..]);
    let source = fields.next_field().ok_or("missing sender")?;
    let verb = fields.next_field().ok_or("missing verb")?;

    let event = match verb {
        "QUIT" => Event::Quit,
        "JOIN" | "PART" => {
            let channel = fields
                .next_field()
                .ok_or_else(|| format!("{} without a channel", verb))?
                .to_string();
            if verb == "JOIN" {
                Event::Join { channel }
            } else {
                Event::Part { channel }
            }
        }
        "PRIVMSG" => {
            let target = fields.next_field().ok_or("PRIVMSG without a target")?;
            let body = fields.trailing().ok_or("PRIVMSG without a body")?;
            Event::Privmsg {
                target: target.to_string(),
                body: body.to_string(),
            }
        }
        other => return Err(format!("unknown notification verb '{}'", other)),
    };

    Ok(Notification::new(source, event))
}

fn decode_reply(line: &str) -> Result<Reply, String> {
    let mut fields = Fields::new(line);
    let code = fields.next_field().ok_or("empty line")?;

    let reply = match code {
        "REPLY_NICK" => Reply::Nick {
            text: fields.trailing_or_empty().to_string(),
        },
        "REPLY_NAMES" => {
            let channel = fields.next_field().ok_or("REPLY_NAMES without a channel")?;
            Reply::Names {
                channel: channel.to_string(),
                nicks: words(fields.trailing_or_empty()),
            }
        }
        "REPLY_LIST" => Reply::List {
            channels: words(fields.trailing_or_empty()),
        },
        "REPLY_TIME" => Reply::Time {
            timestamp: fields.trailing().ok_or("REPLY_TIME without a timestamp")?.to_string(),
        },
        "REPLY_INFO" => Reply::Info {
            text: fields.trailing_or_empty().to_string(),
        },
        "PONG" => Reply::Pong {
            token: fields.rest().trim_end().to_string(),
        },
        "ERROR" => Reply::Error {
            message: fields.trailing_or_empty().to_string(),
        },
        other => return Err(format!("unknown reply code '{}'", other)),
    };

    Ok(reply)
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Whitespace-separated field reader with the `:` trailing rule
struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn next_field(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        let end = s.find(char::is_whitespace).unwrap_or(s.len());
        let (field, rest) = s.split_at(end);
        self.rest = rest;
        Some(field)
    }

    /// Remainder of the line with leading whitespace removed
    fn rest(&mut self) -> &'a str {
        let s = self.rest.trim_start();
        self.rest = "";
        s
    }

    /// Final field: a leading `:` takes the rest of the line verbatim,
    /// otherwise the next single field is used
    fn trailing(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        match s.strip_prefix(TRAILING_MARKER) {
            Some(verbatim) => {
                self.rest = "";
                Some(verbatim)
            }
            None => self.next_field(),
        }
    }

    fn trailing_or_empty(&mut self) -> &'a str {
        self.trailing().unwrap_or("")
    }
}
