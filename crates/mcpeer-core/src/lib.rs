//! Request tracker, timeout manager, request context, retry/pagination
//! helpers, and structured logging for the mcpeer MCP runtime.
//!
//! This crate sits directly above `mcpeer-wire`: it knows about
//! correlation, deadlines, and handler-facing context, but nothing about
//! transports or dispatch registries (those live in `mcpeer-transport*`,
//! `mcpeer-server`, and `mcpeer-peer`).

mod config;
mod context;
mod error;
mod logging;
mod retry;
mod timeout;
mod tracker;

pub use config::CoreConfig;
pub use context::{NullProgressSink, ProgressSink, RequestContext};
pub use error::PendingError;
pub use logging::{LogOutput, LogRotation, LoggingConfig, LoggingGuard, LoggingHandle, Span};
pub use retry::{list_all, retry_with_backoff, ExponentialBackoff, LinearBackoff, RetryPolicy};
pub use timeout::{run_sweeper, ExpireCallback, TimeoutManager, DEFAULT_TIMEOUT};
pub use tracker::{DuplicateIdError, ErrorCallback, PendingRequest, RequestTracker, SuccessCallback};
