//! parley-protocol: Wire protocol shared by the parley client and server
//!
//! The protocol is line-oriented text over TCP. Clients send [`Command`]s;
//! the server answers with [`Reply`]s and pushes [`Notification`]s about
//! other users. This crate holds the types, their text encoding, the
//! name validation rules, and the `tokio_util` codecs used on each end.

pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod validate;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, ServerCodec};
pub use command::Command;
pub use error::{CommandError, ServerError};
pub use message::{
    decode, DecodedMessage, Event, Notification, Reply, ServerMessage, TIMESTAMP_FORMAT,
};
pub use validate::{is_valid_channel_name, is_valid_nickname, CHANNEL_PREFIX, MAX_NICK_LEN};

/// Default TCP port of a parley server
pub const DEFAULT_PORT: u16 = 6667;
