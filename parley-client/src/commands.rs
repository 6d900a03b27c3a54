//! Terminal input parsing
//!
//! Turns lines typed at the prompt, like `/join #rust` or plain text, into
//! [`Input`] actions for the REPL.

/// Parsed prompt input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Join(String),
    /// Leave the named channel, or the current one
    Part(Option<String>),
    Names(Option<String>),
    List,
    Time,
    Info,
    Ping(Option<String>),
    Msg { target: String, body: String },
    Quit,
    Help,
    /// Plain text for the current channel
    Say(String),
    /// Unknown slash command
    Unknown(String),
}

/// Error parsing prompt input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Empty line
    Empty,
    /// A required argument is missing
    MissingArgument(&'static str),
    /// Invalid syntax
    InvalidSyntax(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty input"),
            ParseError::MissingArgument(what) => write!(f, "missing {}", what),
            ParseError::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Help text printed for `/help`
pub const HELP: &str = "\
/join <#channel>        join a channel and make it current
/part [#channel]        leave a channel
/names [#channel]       list channel members
/list                   list channels on the server
/msg <target> <text>    message a user or channel
/time                   show the server clock
/info                   show server information
/ping [token]           check the server responds
/quit                   disconnect and exit
<text>                  say something in the current channel";

/// Parse one line of prompt input
///
/// # Examples
///
/// ```
/// use parley_client::commands::{parse_input, Input};
///
/// assert_eq!(parse_input("/join #rust").unwrap(), Input::Join("#rust".into()));
/// assert_eq!(parse_input("hello all").unwrap(), Input::Say("hello all".into()));
/// ```
pub fn parse_input(input: &str) -> Result<Input, ParseError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some(command) = input.strip_prefix('/') else {
        return Ok(Input::Say(input.to_string()));
    };

    let (name, rest) = split_first_token(command);
    let rest = rest.trim();
    let arg = (!rest.is_empty()).then(|| first_token(rest).to_string());

    match name.to_lowercase().as_str() {
        "" => Err(ParseError::InvalidSyntax("expected a command after /".into())),
        "join" | "j" => arg.map(Input::Join).ok_or(ParseError::MissingArgument("channel")),
        "part" | "leave" => Ok(Input::Part(arg)),
        "names" => Ok(Input::Names(arg)),
        "list" => Ok(Input::List),
        "time" => Ok(Input::Time),
        "info" => Ok(Input::Info),
        "ping" => Ok(Input::Ping(arg)),
        "msg" | "m" => parse_msg(rest),
        "quit" | "exit" => Ok(Input::Quit),
        "help" | "?" => Ok(Input::Help),
        other => Ok(Input::Unknown(other.to_string())),
    }
}

/// Parse the /msg arguments: `<target> <text>`
fn parse_msg(args: &str) -> Result<Input, ParseError> {
    let (target, body) = split_first_token(args);
    if target.is_empty() {
        return Err(ParseError::MissingArgument("target"));
    }

    let body = body.trim();
    if body.is_empty() {
        return Err(ParseError::MissingArgument("message text"));
    }

    Ok(Input::Msg {
        target: target.to_string(),
        body: body.to_string(),
    })
}

/// Split the first whitespace-delimited token from a string
fn split_first_token(input: &str) -> (&str, &str) {
    match input.find(char::is_whitespace) {
        Some(pos) => (&input[..pos], &input[pos..]),
        None => (input, ""),
    }
}

fn first_token(input: &str) -> &str {
    split_first_token(input).0
}
