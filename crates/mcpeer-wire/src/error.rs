//! JSON-RPC error objects and the reserved error code space.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::RequestId;

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error object from a [`JsonRpcErrorCode`] and message.
    pub fn new(code: JsonRpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The reserved JSON-RPC / MCP error code space.
///
/// Codes `-32000..=-32099` are reserved for implementation-defined server
/// errors and are carried as [`Self::Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    /// `-32700` — the payload could not be parsed as JSON-RPC.
    ParseError,
    /// `-32600` — well-formed JSON but not a valid request envelope.
    InvalidRequest,
    /// `-32601` — the method is not known to this peer.
    MethodNotFound,
    /// `-32602` — the method is known but params failed validation.
    InvalidParams,
    /// `-32603` — an unexpected internal failure.
    InternalError,
    /// An implementation-defined server error in `-32000..=-32099`.
    Server(i32),
}

impl JsonRpcErrorCode {
    /// The numeric code.
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Server(code) => code,
        }
    }

    /// The standard message for the reserved codes; `"Server error"` for
    /// implementation-defined codes (callers should supply their own).
    pub fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::Server(_) => "Server error",
        }
    }
}

/// A message could not be parsed as a valid JSON-RPC envelope.
///
/// The offending raw payload is deliberately not carried on this type —
/// attacker-supplied input must never be echoed back into logs or
/// responses.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}")]
pub struct ParseError {
    /// What specifically was wrong with the payload.
    pub kind: ParseErrorKind,
    /// The id recovered via best-effort extraction, if any.
    pub extracted_id: Option<RequestId>,
}

impl ParseError {
    /// Builds a parse error of the given kind with no recovered id.
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            extracted_id: None,
        }
    }

    /// Attaches a best-effort recovered id.
    pub fn with_extracted_id(mut self, id: Option<RequestId>) -> Self {
        self.extracted_id = id;
        self
    }

    /// Renders this parse error as the JSON-RPC error response it implies.
    pub fn to_error_object(&self) -> JsonRpcError {
        JsonRpcError::new(JsonRpcErrorCode::ParseError, "Parse error")
    }
}

/// The specific way a payload failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    /// The payload was not valid JSON at all.
    #[error("invalid JSON")]
    NotJson,
    /// `jsonrpc` was missing or not exactly `"2.0"`.
    #[error("invalid or missing jsonrpc version")]
    InvalidJsonRpcVersion,
    /// A required field was missing.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field had the wrong JSON type.
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
    /// A response carried both `result` and `error`, or neither.
    #[error("response must carry exactly one of `result` or `error`")]
    ResultErrorExclusivity,
}
