//! Stdio transport configuration.

use mcpeer_transport::LimitsConfig;
use serde::{Deserialize, Serialize};

use crate::framing::Framing;

/// Configuration for [`crate::StdioTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioTransportConfig {
    /// Framing used for *outbound* writes. Inbound framing is always
    /// auto-detected regardless of this setting. Server binaries started
    /// by a Content-Length-framing host should set this to
    /// [`Framing::ContentLength`]; the default is newline-delimited,
    /// matching the common case of a host-spawned MCP server talking
    /// line-oriented JSON.
    pub write_framing: Framing,

    /// Read buffer chunk size in bytes.
    pub read_chunk_size: usize,

    /// Message size limits, enforced on both the outbound write path and
    /// the inbound reader loop.
    pub limits: LimitsConfig,
}

impl Default for StdioTransportConfig {
    fn default() -> Self {
        Self {
            write_framing: Framing::NewlineDelimited,
            read_chunk_size: 8192,
            limits: LimitsConfig::default(),
        }
    }
}
