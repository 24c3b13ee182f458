//! The abstract transport contract (C4).
//!
//! A `Transport` is polymorphic over one capability set: `connect`,
//! `disconnect`, `is_connected`, `send`, plus callback registration for
//! inbound messages and transport-level errors.
//! Concrete implementations — `mcpeer-transport-stdio`'s
//! `StdioTransport` and `mcpeer-transport-http`'s `HttpTransport` — own
//! the framing boundary; everything above this trait sees only complete,
//! unframed JSON-RPC message bytes.
//!
//! Transports are non-copyable (`Send + Sync`, stored behind an `Arc`),
//! callback registration happens once before `connect()`, and `send` is
//! thread-safe. A transport must guarantee that its message callback
//! fires exactly once per fully received logical message, in arrival
//! order; outbound sends it buffers must be delivered in submission
//! order.

use async_trait::async_trait;

use crate::error::TransportResult;

/// Invoked once per complete inbound message, carrying the raw unframed
/// JSON bytes. Called from the transport's background reader; must not
/// block for long since it runs on the hot read path.
pub type MessageCallback = Box<dyn Fn(Vec<u8>) + Send + Sync>;

/// Invoked on a transport-level fault (connection loss, framing failure).
/// The message callback stays silent on such faults — this is a distinct
/// channel.
pub type ErrorCallback = Box<dyn Fn(crate::error::TransportError) + Send + Sync>;

/// Which concrete transport this is, for logging/metrics and
/// capability-sensitive dispatch (e.g. choosing SSE vs. newline-delimited
/// JSON framing for streaming results in `mcpeer-core::RequestContext`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// The transport contract implemented by every concrete transport.
///
/// Lifecycle is explicit: construction does not imply a live connection,
/// and callers control exactly when `connect()` happens. Callback
/// registration (`set_message_callback`/`set_error_callback`) must occur
/// before `connect()` — messages arriving before a callback is registered
/// would otherwise be silently dropped.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which concrete transport this is.
    fn kind(&self) -> TransportKind;

    /// Establishes the connection (spawns the child process, or marks the
    /// HTTP adapter ready to accept POST/GET calls).
    async fn connect(&self) -> TransportResult<()>;

    /// Tears the connection down: closes pipes, joins the reader task,
    /// reaps an owned child process.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Whether the transport currently considers itself connected.
    fn is_connected(&self) -> bool;

    /// Sends one complete, already-framed message. Implementations may
    /// buffer internally but must preserve submission order and must
    /// never block while holding a library lock.
    async fn send(&self, message: Vec<u8>) -> TransportResult<()>;

    /// Registers the callback invoked for each complete inbound message.
    /// Must be called before `connect()`.
    fn set_message_callback(&self, callback: MessageCallback);

    /// Registers the callback invoked on a transport-level fault. Must be
    /// called before `connect()`.
    fn set_error_callback(&self, callback: ErrorCallback);
}
