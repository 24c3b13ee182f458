//! Transport-level errors (C4, `TransportError`).
//!
//! Surfaced via the error callback registered with
//! [`crate::Transport::set_error_callback`]. The engine that owns a
//! transport treats every one of these as fatal for the session: all
//! pending requests are cancelled and the session is torn down.

use thiserror::Error;

/// A specialized `Result` for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// A transport-level fault: connection loss, framing failure, or a failed
/// write. Never a protocol-level failure — those stay inside the JSON-RPC
/// response/error surface.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The underlying connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A previously established connection was lost (child exited, socket
    /// closed, peer disconnected).
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A message could not be written to the transport.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A message violated the transport's framing rules (malformed
    /// Content-Length header, unterminated SSE frame, etc).
    #[error("framing error: {0}")]
    Framing(String),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(String),

    /// The transport was asked to perform an operation that requires a
    /// connection it doesn't have (e.g. `send` before `connect`).
    #[error("not connected")]
    NotConnected,

    /// The operation isn't supported by this transport implementation.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
