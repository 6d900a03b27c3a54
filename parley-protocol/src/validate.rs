//! Name validation shared by both ends of the protocol
//!
//! A word character is an ASCII letter, digit or underscore.

/// Maximum nickname length in characters
pub const MAX_NICK_LEN: usize = 9;

/// Prefix that marks a target as a channel
pub const CHANNEL_PREFIX: char = '#';

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A nickname is one letter or underscore followed by up to eight word characters
pub fn is_valid_nickname(nick: &str) -> bool {
    let mut chars = nick.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    nick.len() <= MAX_NICK_LEN && chars.all(is_word_char)
}

/// A channel name is `#` followed by zero or more word characters
pub fn is_valid_channel_name(name: &str) -> bool {
    match name.strip_prefix(CHANNEL_PREFIX) {
        Some(rest) => rest.chars().all(is_word_char),
        None => false,
    }
}
