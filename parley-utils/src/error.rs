//! Error types for parley
//!
//! Provides a unified error type used across all parley crates.

use std::io;
use std::path::PathBuf;

/// Classification of a network-layer failure
///
/// Each kind renders as a human-readable message suitable for showing to a
/// user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// The host name could not be resolved
    HostNotFound,
    /// No route to the host or its network
    Unreachable,
    /// The server actively refused the connection
    Refused,
    /// The operating system denied the operation
    PermissionDenied,
    /// The local address or port is already taken
    PortInUse,
    /// The connection was reset or aborted mid-session
    Reset,
    /// The stream ended before the expected data arrived
    UnexpectedEof,
    /// Anything else
    Other,
}

impl ConnectionErrorKind {
    /// Classify an I/O error raised while connecting or talking to a server
    pub fn classify(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) if code == libc::EHOSTUNREACH || code == libc::ENETUNREACH => {
                return Self::Unreachable;
            }
            _ => {}
        }

        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => Self::PortInUse,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::Reset,
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Other,
        }
    }

    /// Human-readable description of this failure class
    pub fn message(&self) -> &'static str {
        match self {
            Self::HostNotFound => "[404] Not Found: Host not found. Check the spelling of the host or your network configuration.",
            Self::Unreachable => "[403] Forbidden: No route to host. Check your firewall or network settings.",
            Self::Refused => "[403] Forbidden: Connection refused by server. Verify the port or server configuration.",
            Self::PermissionDenied => "[403] Forbidden: Permission denied. Check server security settings.",
            Self::PortInUse => "[503] Service Unavailable: Port is already in use. Please try a different port.",
            Self::Reset => "[500] Internal Server Error: Connection issue with the server.",
            Self::UnexpectedEof => "[500] Internal Server Error: End of stream encountered.",
            Self::Other => "Unknown I/O error occurred",
        }
    }
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Main error type for parley operations
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // === Input Errors ===

    #[error("[400] Bad Request: {0}")]
    InvalidInput(String),

    // === Connection Errors ===

    #[error("{}", connection_message(.kind, .detail))]
    Connection {
        kind: ConnectionErrorKind,
        detail: String,
    },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Not connected to a server")]
    NotConnected,

    #[error("Already connected to a server")]
    AlreadyConnected,

    // === Protocol Errors ===

    #[error("Server responded with error message: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

fn connection_message(kind: &ConnectionErrorKind, detail: &str) -> String {
    match kind {
        ConnectionErrorKind::Other => format!("{}: {}", kind.message(), detail),
        _ => kind.message().to_string(),
    }
}

impl ParleyError {
    /// Create an input validation error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a classified connection error from an I/O error
    pub fn connection(err: &io::Error) -> Self {
        Self::Connection {
            kind: ConnectionErrorKind::classify(err),
            detail: err.to_string(),
        }
    }

    /// Create a connection error of a known kind
    pub fn connection_kind(kind: ConnectionErrorKind, detail: impl Into<String>) -> Self {
        Self::Connection {
            kind,
            detail: detail.into(),
        }
    }

    /// Create a server-reported error
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The connection failure class, if this is a connection error
    pub fn connection_kind_of(&self) -> Option<ConnectionErrorKind> {
        match self {
            Self::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias using ParleyError
pub type Result<T> = std::result::Result<T, ParleyError>;
