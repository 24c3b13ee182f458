//! JSON-RPC 2.0 wire types for the mcpeer MCP runtime.
//!
//! This crate owns the message model only: parsing, validation,
//! serialization, and the reserved error code space. It knows nothing
//! about transports, correlation, or dispatch — those live in
//! `mcpeer-core`, `mcpeer-transport*`, `mcpeer-peer`, and `mcpeer-server`.

mod codec;
mod error;
mod extract;
mod id;
mod message;

pub use codec::{to_string, to_string_delimited};
pub use error::{JsonRpcError, JsonRpcErrorCode, ParseError, ParseErrorKind};
pub use extract::extract_request_id;
pub use id::{RequestId, ResponseId};
pub use message::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload, JsonRpcVersion, parse_message, parse_request, parse_response,
};

/// The MCP protocol version string this peer negotiates in `initialize`.
///
/// Exact-string match is the minimal conformant check; a version-range
/// negotiation mode is left to the engine layer (`mcpeer-peer`) as an
/// acceptable extension.
pub const PROTOCOL_VERSION: &str = "2025-11-25";
