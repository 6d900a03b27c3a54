//! parley-client: Chat client engine for parley servers
//!
//! [`ChatClient`] owns one TCP connection. Commands return [`Deferred`]
//! results that complete when the server answers; everything else the
//! server pushes is mirrored into local [`Target`]s and reported to
//! registered [`ChatObserver`]s.

pub mod commands;
pub mod config;
pub mod connection;
pub mod deferred;
pub mod state;

pub use config::{ClientConfig, ConfigLoader};
pub use connection::{
    CallbackObserver, ChatClient, ChatEvent, ChatObserver, ConnectionState, ObserverId,
    ObserverRouting,
};
pub use deferred::Deferred;
pub use state::{Channel, Message, Target};
