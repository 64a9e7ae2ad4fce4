//! Error types for the chat client.
//!
//! This module defines error types for connection lifecycle failures,
//! protocol-level timeouts, and wire-format parsing issues.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error during connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Host name was not a valid TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// `connect()` was called while a connection is already being
    /// established or is active.
    #[error("already connected")]
    AlreadyConnected,

    /// An operation that requires a registered connection was attempted
    /// before registration completed.
    #[error("not registered")]
    NotRegistered,

    /// The server did not acknowledge registration with a welcome reply
    /// within the registration timeout.
    #[error("server did not acknowledge registration")]
    RegistrationTimeout,

    /// The server did not answer a keepalive probe in time; the
    /// connection is considered dead.
    #[error("server did not reply to PING")]
    PingTimeout,

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// A line exceeded the maximum allowed length.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// Failed to parse a wire message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing wire messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,
}
