//! Streamable HTTP transport configuration.

use std::time::Duration;

use mcpeer_transport::LimitsConfig;

use crate::session::{DEFAULT_SESSION_IDLE_TIMEOUT, DEFAULT_SSE_BUFFER_CAP};

/// Tuning knobs for [`crate::HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// How long a session may go without activity before it's purged.
    pub session_idle_timeout: Duration,
    /// How many outbound events a session buffers for `Last-Event-ID`
    /// resumption before dropping the oldest.
    pub sse_buffer_cap: usize,
    /// Message size limits, enforced on both inbound POST bodies and
    /// outbound session sends.
    pub limits: LimitsConfig,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            sse_buffer_cap: DEFAULT_SSE_BUFFER_CAP,
            limits: LimitsConfig::default(),
        }
    }
}
