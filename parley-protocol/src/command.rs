//! Commands sent from a client to the server
//!
//! `Display` is the encoder; [`Command::parse`] is the server-side decoder.

use std::fmt;

use crate::error::CommandError;

/// One client command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `NICK <nick>`
    Nick(String),
    /// `QUIT`
    Quit,
    /// `JOIN <#channel>`
    Join(String),
    /// `PART <#channel>`
    Part(String),
    /// `NAMES <#channel>`
    Names(String),
    /// `LIST`
    List,
    /// `PRIVMSG <target> :<text>`
    Privmsg { target: String, body: String },
    /// `TIME`
    Time,
    /// `INFO`
    Info,
    /// `PING <token>`
    Ping(String),
}

impl Command {
    /// Protocol verb of this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Nick(_) => "NICK",
            Command::Quit => "QUIT",
            Command::Join(_) => "JOIN",
            Command::Part(_) => "PART",
            Command::Names(_) => "NAMES",
            Command::List => "LIST",
            Command::Privmsg { .. } => "PRIVMSG",
            Command::Time => "TIME",
            Command::Info => "INFO",
            Command::Ping(_) => "PING",
        }
    }

    /// Parse one line received by the server
    ///
    /// Single-argument commands take the rest of the line as their argument,
    /// so a missing argument parses as the empty string and is left for
    /// name validation to reject. The `PING` token is kept verbatim.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim_start();
        if line.trim_end().is_empty() {
            return Err(CommandError::Empty);
        }

        let (verb, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim_start()),
            None => (line, ""),
        };

        let command = match verb {
            "NICK" => Command::Nick(rest.trim_end().to_string()),
            "QUIT" => Command::Quit,
            "JOIN" => Command::Join(rest.trim_end().to_string()),
            "PART" => Command::Part(rest.trim_end().to_string()),
            "NAMES" => Command::Names(rest.trim_end().to_string()),
            "LIST" => Command::List,
            "PRIVMSG" => parse_privmsg(rest)?,
            "TIME" => Command::Time,
            "INFO" => Command::Info,
            "PING" => Command::Ping(rest.to_string()),
            other => return Err(CommandError::UnknownVerb(other.to_string())),
        };

        Ok(command)
    }
}

fn parse_privmsg(args: &str) -> Result<Command, CommandError> {
    let (target, message) = args
        .split_once(char::is_whitespace)
        .ok_or(CommandError::InvalidPrivmsg)?;
    let body = message
        .trim_start()
        .strip_prefix(':')
        .ok_or(CommandError::InvalidPrivmsg)?;

    Ok(Command::Privmsg {
        target: target.to_string(),
        body: body.to_string(),
    })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Nick(nick) => write!(f, "NICK {}", nick),
            Command::Join(channel) => write!(f, "JOIN {}", channel),
            Command::Part(channel) => write!(f, "PART {}", channel),
            Command::Names(channel) => write!(f, "NAMES {}", channel),
            Command::Privmsg { target, body } => write!(f, "PRIVMSG {} :{}", target, body),
            Command::Ping(token) => write!(f, "PING {}", token),
            Command::Quit | Command::List | Command::Time | Command::Info => {
                f.write_str(self.verb())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_forms() {
        assert_eq!(Command::Nick("alice".into()).to_string(), "NICK alice");
        assert_eq!(Command::Quit.to_string(), "QUIT");
        assert_eq!(Command::Join("#a".into()).to_string(), "JOIN #a");
        assert_eq!(Command::Part("#a".into()).to_string(), "PART #a");
        assert_eq!(Command::Names("#a".into()).to_string(), "NAMES #a");
        assert_eq!(Command::List.to_string(), "LIST");
        assert_eq!(
            Command::Privmsg {
                target: "#a".into(),
                body: "hi there".into()
            }
            .to_string(),
            "PRIVMSG #a :hi there"
        );
        assert_eq!(Command::Time.to_string(), "TIME");
        assert_eq!(Command::Info.to_string(), "INFO");
        assert_eq!(Command::Ping("tok".into()).to_string(), "PING tok");
    }

    #[test]
    fn test_parse_every_encoded_form() {
        let commands = vec![
            Command::Nick("alice".into()),
            Command::Quit,
            Command::Join("#a".into()),
            Command::Part("#a".into()),
            Command::Names("#a".into()),
            Command::List,
            Command::Privmsg {
                target: "bob".into(),
                body: "hello :) with  spaces".into(),
            },
            Command::Time,
            Command::Info,
            Command::Ping("12345".into()),
        ];

        for cmd in commands {
            assert_eq!(Command::parse(&cmd.to_string()), Ok(cmd.clone()), "{cmd}");
        }
    }

    #[test]
    fn test_parse_missing_argument_is_empty_string() {
        assert_eq!(Command::parse("JOIN"), Ok(Command::Join(String::new())));
        assert_eq!(Command::parse("NICK   "), Ok(Command::Nick(String::new())));
        assert_eq!(Command::parse("PING"), Ok(Command::Ping(String::new())));
    }

    #[test]
    fn test_parse_collapses_whitespace_after_verb() {
        assert_eq!(
            Command::parse("JOIN    #rust"),
            Ok(Command::Join("#rust".into()))
        );
    }

    #[test]
    fn test_parse_ignores_extra_args_on_argless_commands() {
        assert_eq!(Command::parse("LIST everything"), Ok(Command::List));
        assert_eq!(Command::parse("QUIT :bye"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_privmsg_requires_colon_body() {
        assert_eq!(
            Command::parse("PRIVMSG bob hello"),
            Err(CommandError::InvalidPrivmsg)
        );
        assert_eq!(Command::parse("PRIVMSG bob"), Err(CommandError::InvalidPrivmsg));
        assert_eq!(Command::parse("PRIVMSG"), Err(CommandError::InvalidPrivmsg));
    }

    #[test]
    fn test_parse_privmsg_empty_body() {
        assert_eq!(
            Command::parse("PRIVMSG #a :"),
            Ok(Command::Privmsg {
                target: "#a".into(),
                body: String::new()
            })
        );
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(
            Command::parse("WHOIS bob"),
            Err(CommandError::UnknownVerb("WHOIS".into()))
        );
        assert_eq!(
            Command::parse("nick alice"),
            Err(CommandError::UnknownVerb("nick".into()))
        );
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
    }
}
