//! Shared configuration defaults.
//!
//! Loading configuration from files or environment variables is left to
//! the embedder; this module only fixes the shapes and defaults, so every
//! crate that needs them (timeouts here, session idle timeout in
//! `mcpeer-transport-http`) agrees on the same numbers.

use std::time::Duration;

use crate::timeout::DEFAULT_TIMEOUT;

/// Engine-level tunables that aren't owned by a single component.
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    /// Per-request deadline used when a caller doesn't specify one.
    pub default_request_timeout: Duration,
    /// How often the timeout sweeper runs.
    pub timeout_sweep_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: DEFAULT_TIMEOUT,
            timeout_sweep_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_timeout_is_five_minutes() {
        assert_eq!(
            CoreConfig::default().default_request_timeout,
            Duration::from_secs(300)
        );
    }
}
