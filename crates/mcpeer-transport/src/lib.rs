//! The abstract transport contract (C4) implemented by
//! `mcpeer-transport-stdio` and `mcpeer-transport-http`.
//!
//! This crate defines *only* the contract and the shared error/config
//! types concrete transports build on. It knows nothing about
//! subprocesses, HTTP, or SSE.

mod config;
mod error;
mod traits;

pub use config::{validate_message_size, LimitsConfig};
pub use error::{TransportError, TransportResult};
pub use traits::{ErrorCallback, MessageCallback, Transport, TransportKind};
