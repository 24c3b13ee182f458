//! The peer/session engine (C8): the component that actually runs an MCP
//! conversation. Couples any [`mcpeer_transport::Transport`] with
//! [`mcpeer_core`]'s request tracker and timeout manager, drives the
//! `initialize` handshake in either role, and dispatches inbound messages
//! to a registered [`RequestHandler`]/[`NotificationHandler`] pair.
//!
//! A client embedder builds a [`Peer`] over a stdio or HTTP transport and
//! calls [`Peer::initialize`]; a server embedder builds one with a
//! [`handler::ServerDispatcher`] wired to its [`mcpeer_server`] registries
//! and lets inbound `initialize` requests answer themselves. Both paths
//! share the same send/receive/cancel/close machinery.

mod capabilities;
mod error;
mod handler;
mod peer;
mod progress;

pub use capabilities::{
    ClientCapabilities, CompletionCapabilities, ElicitationCapabilities, Implementation,
    InitializeParams, InitializeResult, LoggingCapabilities, PeerInfo, PromptsCapabilities,
    ResourcesCapabilities, RootsCapabilities, SamplingCapabilities, ServerCapabilities,
    ToolsCapabilities, negotiate_protocol_version,
};
pub use error::PeerError;
pub use handler::{NotificationHandler, NullNotificationHandler, RequestHandler, ServerDispatcher};
pub use peer::{Peer, PeerBuilder, ProgressCallback, DEFAULT_ORIGIN};
pub use progress::{SessionProgressSink, TransportProgressSink};
