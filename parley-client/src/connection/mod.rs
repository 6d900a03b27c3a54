//! Client-server connection management
//!
//! Provides the TCP connection to a parley server with line framing,
//! request correlation and observer dispatch.

mod client;
mod handler;
mod pending;

pub use client::{ChatClient, ConnectionState};
pub use handler::{CallbackObserver, ChatEvent, ChatObserver, ObserverId, ObserverList, ObserverRouting};
