//! Terminal errors delivered through a pending request's error callback.

use mcpeer_wire::JsonRpcError;

/// The reason a pending request was completed with failure rather than a
/// result.
///
/// `Timeout` and `Cancelled` share a surface deliberately — from the
/// caller's point of view both simply mean "no result will arrive" — but
/// keep a distinct tag so callers can tell a user-initiated cancel from a
/// deadline expiry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PendingError {
    /// The request exceeded its deadline with no response.
    #[error("request timed out")]
    Timeout,
    /// The request was cancelled, carrying the caller-supplied reason.
    #[error("request cancelled: {0}")]
    Cancelled(String),
    /// The peer replied with a JSON-RPC error.
    #[error("{}: {}", .0.code, .0.message)]
    Protocol(JsonRpcError),
    /// The transport the request was sent over failed.
    #[error("transport error: {0}")]
    Transport(String),
}
