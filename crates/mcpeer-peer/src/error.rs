//! Peer-level errors (C8): the union of everything that can end a send, a
//! handshake, or a session.

use mcpeer_core::PendingError;
use mcpeer_transport::TransportError;
use mcpeer_wire::JsonRpcError;

/// A failure surfaced by the peer engine.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PeerError {
    /// The remote end returned a JSON-RPC error for a request.
    #[error("protocol error: {0:?}")]
    Protocol(JsonRpcError),

    /// The underlying transport failed; the session is no longer usable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A request's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// A request was cancelled, locally or by the remote end.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// An operation that requires a completed handshake was attempted
    /// before one occurred.
    #[error("peer is not initialized")]
    NotInitialized,

    /// The remote end's declared protocol version could not be
    /// reconciled with this peer's supported set.
    #[error("protocol version mismatch: {0}")]
    VersionMismatch(String),

    /// The peer has been closed; no further operations are possible.
    #[error("peer is closed")]
    Closed,

    /// A request's params or result could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PeerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<PendingError> for PeerError {
    fn from(err: PendingError) -> Self {
        match err {
            PendingError::Timeout => Self::Timeout,
            PendingError::Cancelled(reason) => Self::Cancelled(reason),
            PendingError::Protocol(error) => Self::Protocol(error),
            PendingError::Transport(detail) => Self::Transport(TransportError::ConnectionLost(detail)),
        }
    }
}
