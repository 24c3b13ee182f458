//! Shared transport-level tunables.
//!
//! Concrete transports extend this with their own config (e.g.
//! `StdioTransportConfig`'s framing choice, `HttpTransportConfig`'s
//! session idle timeout and SSE buffer cap); this module only fixes the
//! limits every transport agrees on.

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Size limits applied uniformly across transports, guarding against
/// unbounded buffering on a malicious or broken peer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum size, in bytes, of a single inbound message. `None` means
    /// unlimited.
    pub max_message_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: Some(16 * 1024 * 1024),
        }
    }
}

impl LimitsConfig {
    /// No size limits at all; useful behind a gateway that already
    /// enforces one.
    pub fn unlimited() -> Self {
        Self {
            max_message_size: None,
        }
    }

    /// Checks `size` against `max_message_size`. `Err((size, max))` when a
    /// cap is set and exceeded, leaving the caller free to embed the
    /// failure in whichever error type its call site returns.
    pub fn check_size(&self, size: usize) -> Result<(), (usize, usize)> {
        match self.max_message_size {
            Some(max) if size > max => Err((size, max)),
            _ => Ok(()),
        }
    }
}

/// Validates that a message size does not exceed `limits`, for call sites
/// that already deal in [`TransportError`] — concrete transports' `send`
/// implementations and inbound read loops.
pub fn validate_message_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    limits.check_size(size).map_err(|(size, max)| {
        TransportError::Framing(format!("message of {size} bytes exceeds the {max}-byte limit"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit_is_sixteen_mebibytes() {
        assert_eq!(
            LimitsConfig::default().max_message_size,
            Some(16 * 1024 * 1024)
        );
    }

    #[test]
    fn unlimited_clears_the_cap() {
        assert_eq!(LimitsConfig::unlimited().max_message_size, None);
    }

    #[test]
    fn validate_message_size_rejects_oversized_payloads() {
        let limits = LimitsConfig {
            max_message_size: Some(10),
        };
        assert!(validate_message_size(10, &limits).is_ok());
        let err = validate_message_size(11, &limits).unwrap_err();
        assert!(matches!(err, TransportError::Framing(_)));
    }

    #[test]
    fn validate_message_size_is_a_no_op_when_unlimited() {
        assert!(validate_message_size(usize::MAX, &LimitsConfig::unlimited()).is_ok());
    }
}
