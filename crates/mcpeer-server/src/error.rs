//! Server-side dispatch errors (C9/C10).

use mcpeer_wire::{JsonRpcError, JsonRpcErrorCode};

/// Implementation-defined server error codes in the reserved
/// `-32000..=-32099` range.
const CODE_TOOL_NOT_FOUND: i32 = -32001;
const CODE_RESOURCE_NOT_FOUND: i32 = -32002;
const CODE_PROMPT_NOT_FOUND: i32 = -32003;

/// A failure in a dispatch registry: either a registration-time conflict
/// (duplicate name, uncompilable schema) or a lookup/validation failure at
/// call time.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// A tool with this name is already registered.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    /// A resource (static or template) with this uri is already registered.
    #[error("duplicate resource uri: {0}")]
    DuplicateResource(String),

    /// A prompt with this name is already registered.
    #[error("duplicate prompt name: {0}")]
    DuplicatePrompt(String),

    /// A supplied JSON Schema could not be compiled.
    #[error("schema compilation failed: {0}")]
    SchemaCompile(String),

    /// `tools/call` named a tool that isn't registered.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// `resources/read` (or subscribe/unsubscribe) named a uri that matches
    /// neither a static resource nor any registered template.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// `prompts/get` named a prompt that isn't registered.
    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    /// Request params failed the tool's input schema. Protocol-level,
    /// distinct from a tool running and reporting its own failure.
    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    /// A required prompt argument was not supplied.
    #[error("missing required prompt argument: {0}")]
    MissingPromptArgument(String),

    /// A resource or prompt handler ran and failed on its own terms
    /// (distinct from a lookup/validation failure the registry itself
    /// detects).
    #[error("handler failed: {0}")]
    HandlerFailed(String),
}

impl ServerError {
    /// Renders this error as the JSON-RPC error object a dispatcher sends
    /// back over the wire.
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        match self {
            Self::InvalidToolArguments(detail) => {
                JsonRpcError::new(JsonRpcErrorCode::InvalidParams, detail.clone())
            }
            Self::ToolNotFound(name) => JsonRpcError::new(
                JsonRpcErrorCode::Server(CODE_TOOL_NOT_FOUND),
                format!("tool not found: {name}"),
            ),
            Self::ResourceNotFound(uri) => JsonRpcError::new(
                JsonRpcErrorCode::Server(CODE_RESOURCE_NOT_FOUND),
                format!("resource not found: {uri}"),
            ),
            Self::PromptNotFound(name) => JsonRpcError::new(
                JsonRpcErrorCode::Server(CODE_PROMPT_NOT_FOUND),
                format!("prompt not found: {name}"),
            ),
            Self::MissingPromptArgument(name) => JsonRpcError::new(
                JsonRpcErrorCode::InvalidParams,
                format!("missing required prompt argument: {name}"),
            ),
            other => JsonRpcError::new(JsonRpcErrorCode::InternalError, other.to_string()),
        }
    }
}
