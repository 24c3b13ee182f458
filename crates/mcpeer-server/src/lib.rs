//! Server-side dispatch registries for the mcpeer MCP runtime: tools,
//! resources (static and templated), and prompts (C9, C10).
//!
//! Each registry is an independent, thread-safe table that an engine (see
//! `mcpeer-peer`) consults while routing inbound requests. None of them
//! own a transport or a session table — registration and dispatch are
//! kept free of delivery concerns, so the same registries serve a stdio
//! server and an HTTP server with many concurrent sessions alike.

mod content;
mod error;
mod prompt;
mod resource;
mod tool;

pub use content::{ContentBlock, ResourceContents};
pub use error::ServerError;
pub use prompt::{
    PromptArgument, PromptDescriptor, PromptHandlerFn, PromptMessage, PromptRegistry, Role,
};
pub use resource::{
    CompletionHandlerFn, ReadResourceParams, ResourceDescriptor, ResourceHandlerFn, ResourceRegistry,
    TemplateHandlerFn,
};
pub use tool::{
    Audience, CallToolResult, ToolAnnotations, ToolDescriptor, ToolHandlerFn, ToolRegistry,
};
