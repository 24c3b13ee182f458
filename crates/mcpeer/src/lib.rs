//! `mcpeer` is a Model Context Protocol peer runtime: one dependency for
//! both sides of an MCP conversation.
//!
//! A *peer* ([`Peer`]) is the same engine whichever role it plays: it
//! couples a transport ([`StdioTransport`] or [`HttpTransport`]) with a
//! request tracker and timeout manager, drives the `initialize`
//! handshake, and dispatches inbound JSON-RPC traffic. A client embedder
//! builds a peer and calls [`Peer::initialize`]; a server embedder wires
//! one to a [`ServerDispatcher`] backed by a [`ToolRegistry`],
//! [`ResourceRegistry`], and [`PromptRegistry`], and lets inbound
//! `initialize` requests answer themselves.
//!
//! # Quick start: a stdio client
//!
//! ```no_run
//! use mcpeer::prelude::*;
//!
//! # async fn run() -> Result<(), PeerError> {
//! let peer = connect_stdio(Command::new("my-mcp-server"), Implementation::new("demo-client", "0.1.0"));
//! peer.connect().await;
//! let result = peer.initialize(ClientCapabilities::default()).await?;
//! println!("connected to {}", result.server_info.name);
//! peer.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Quick start: a stdio server
//!
//! ```no_run
//! use mcpeer::prelude::*;
//!
//! # async fn run() {
//! let tools = ToolRegistry::new();
//! let resources = ResourceRegistry::new();
//! let prompts = PromptRegistry::new();
//! let dispatcher = ServerDispatcher::new(tools.into(), resources.into(), prompts.into());
//! let peer = serve_stdio(Implementation::new("demo-server", "0.1.0"), dispatcher);
//! peer.connect().await;
//! # }
//! ```

pub use mcpeer_core::{
    CoreConfig, DuplicateIdError, ErrorCallback as TrackerErrorCallback, ExpireCallback,
    ExponentialBackoff, LinearBackoff, LogOutput, LogRotation, LoggingConfig, LoggingGuard,
    LoggingHandle, NullProgressSink, PendingError, PendingRequest, ProgressSink, RequestContext,
    RequestTracker, RetryPolicy, Span, SuccessCallback as TrackerSuccessCallback, TimeoutManager,
    DEFAULT_TIMEOUT,
    list_all, retry_with_backoff, run_sweeper,
};
pub use mcpeer_peer::{
    ClientCapabilities, CompletionCapabilities, DEFAULT_ORIGIN, ElicitationCapabilities,
    Implementation, InitializeParams, InitializeResult, LoggingCapabilities,
    NotificationHandler, NullNotificationHandler, Peer, PeerBuilder, PeerError, PeerInfo,
    ProgressCallback, PromptsCapabilities, RequestHandler, ResourcesCapabilities,
    RootsCapabilities, SamplingCapabilities, ServerCapabilities, ServerDispatcher,
    SessionProgressSink, ToolsCapabilities, TransportProgressSink, negotiate_protocol_version,
};
pub use mcpeer_server::{
    Audience, CallToolResult, CompletionHandlerFn, ContentBlock, PromptArgument,
    PromptDescriptor, PromptHandlerFn, PromptMessage, PromptRegistry, ReadResourceParams,
    ResourceContents, ResourceDescriptor, ResourceHandlerFn, ResourceRegistry, Role, ServerError,
    TemplateHandlerFn, ToolAnnotations, ToolDescriptor, ToolHandlerFn, ToolRegistry,
};
pub use mcpeer_transport::{
    validate_message_size, ErrorCallback as TransportErrorCallback, LimitsConfig, MessageCallback,
    Transport, TransportError, TransportKind, TransportResult,
};
pub use mcpeer_transport_http::{
    CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HttpTransport, HttpTransportConfig, Session,
    SessionId, SessionLookupError, SessionMessageCallback, SessionSendError, SessionTable,
    SseSender, TemplateError, UriTemplate, format_event, format_keepalive,
};
pub use mcpeer_transport_stdio::{Framing, FrameAccumulator, StdioTransport, StdioTransportConfig, frame};
pub use mcpeer_wire::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, ParseError, ParseErrorKind,
    RequestId, ResponseId, PROTOCOL_VERSION, extract_request_id, parse_message, parse_request,
    parse_response, to_string, to_string_delimited,
};

// Re-exported for embedders spawning server subprocesses without pulling
// in `tokio` directly.
pub use tokio::process::Command;

/// The commonly needed set, in one `use mcpeer::prelude::*;`.
pub mod prelude {
    pub use crate::{
        CallToolResult, ClientCapabilities, Command, HttpTransport, HttpTransportConfig,
        Implementation, InitializeResult, Peer, PeerBuilder, PeerError, PromptRegistry,
        RequestContext, ResourceRegistry, ServerCapabilities, ServerDispatcher, StdioTransport,
        StdioTransportConfig, ToolRegistry, Transport, TransportError,
    };
    pub use crate::{connect_http, connect_stdio, serve_http, serve_stdio};
}

use std::sync::Arc;

/// Builds a client-role [`Peer`] that spawns `command` and speaks MCP over
/// its piped stdin/stdout. Call [`Peer::connect`] to start reading, then
/// [`Peer::initialize`] to perform the handshake.
pub fn connect_stdio(command: Command, local_info: Implementation) -> Peer {
    let transport = Arc::new(StdioTransport::spawn(command, StdioTransportConfig::default()));
    PeerBuilder::new(transport, local_info).build()
}

/// Builds a client-role [`Peer`] over an already-connected transport, such
/// as a [`StdioTransport::inherited`] instance or an [`HttpTransport`]
/// dialed to a remote session. Prefer [`connect_stdio`] for the common
/// spawn-a-subprocess case.
pub fn connect_with(transport: Arc<dyn Transport>, local_info: Implementation) -> Peer {
    PeerBuilder::new(transport, local_info).build()
}

/// Builds a server-role [`Peer`] that inherits the process's own
/// stdin/stdout, dispatching inbound requests to `dispatcher`. This is
/// the shape a binary launched by an MCP host (Claude Desktop, an IDE
/// extension) takes: the host owns the child process, mcpeer owns the
/// pipe.
pub fn serve_stdio(local_info: Implementation, dispatcher: ServerDispatcher) -> Peer {
    let transport = Arc::new(StdioTransport::inherited(StdioTransportConfig::default()));
    PeerBuilder::new(transport, local_info)
        .request_handler(Arc::new(dispatcher))
        .build()
}

/// Builds a server-role [`Peer`] over a fresh [`HttpTransport`], ready to
/// be handed to an HTTP server's POST/GET handlers. The returned
/// `HttpTransport` must be kept alive alongside the peer; both share
/// ownership of the same session table.
pub fn serve_http(
    local_info: Implementation,
    dispatcher: ServerDispatcher,
    config: HttpTransportConfig,
) -> (Peer, Arc<HttpTransport>) {
    let http = Arc::new(HttpTransport::new(config));
    let peer = PeerBuilder::new(http.clone(), local_info)
        .http_transport(http.clone())
        .request_handler(Arc::new(dispatcher))
        .build();
    (peer, http)
}

/// Builds a client-role [`Peer`] over a fresh [`HttpTransport`] dialed at
/// a remote MCP server. The returned `HttpTransport` is what the
/// embedder's HTTP client drives (issuing the POSTs and opening the SSE
/// stream); the peer only sees bytes in and out through it.
pub fn connect_http(local_info: Implementation, config: HttpTransportConfig) -> (Peer, Arc<HttpTransport>) {
    let http = Arc::new(HttpTransport::new(config));
    let peer = PeerBuilder::new(http.clone(), local_info)
        .http_transport(http.clone())
        .build();
    (peer, http)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_stdio_builds_without_connecting() {
        let peer = connect_stdio(Command::new("true"), Implementation::new("test", "0.0.0"));
        assert_eq!(peer.pending_request_count(), 0);
    }

    #[test]
    fn serve_http_shares_the_session_table_with_the_peer() {
        let dispatcher = ServerDispatcher::new(
            Arc::new(ToolRegistry::new()),
            Arc::new(ResourceRegistry::new()),
            Arc::new(PromptRegistry::new()),
        );
        let (peer, http) = serve_http(
            Implementation::new("test-server", "0.0.0"),
            dispatcher,
            HttpTransportConfig::default(),
        );
        assert_eq!(http.session_count(), 0);
        assert_eq!(peer.pending_request_count(), 0);
    }
}
