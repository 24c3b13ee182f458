//! Initialize handshake types: capability declarations and the
//! `initialize` request/result pair (C8).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one peer implementation, carried in both directions of the
/// handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootsCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplingCapabilities;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElicitationCapabilities;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingCapabilities;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionCapabilities;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourcesCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptsCapabilities {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// What a client declares it supports in `initialize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapabilities>,
}

/// What a server declares it supports in the `initialize` result, derived
/// from which registries are non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
}

/// Params of the client-sent `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Result of a successful `initialize` exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// The negotiated handshake outcome, held in the peer info slot after
/// `initialize` completes. Which side's `Implementation`/capabilities are
/// "peer" vs. "self" depends on role: a client peer's info is its own
/// declaration and the peer info is the server's; a server peer's own
/// info is static config and the peer info is the client's.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub protocol_version: String,
    pub client_capabilities: ClientCapabilities,
    pub client_info: Option<Implementation>,
    pub server_capabilities: ServerCapabilities,
    pub server_info: Option<Implementation>,
}

/// Negotiates a protocol version: exact match if the client's version is
/// in `supported`; otherwise fall back to `preferred` if `allow_fallback`,
/// else reject.
pub fn negotiate_protocol_version(
    client_version: &str,
    supported: &[&str],
    preferred: &str,
    allow_fallback: bool,
) -> Result<String, String> {
    if supported.contains(&client_version) {
        return Ok(client_version.to_string());
    }
    if !allow_fallback {
        return Err(format!(
            "protocol version '{client_version}' not supported; supported versions: {supported:?}"
        ));
    }
    Ok(preferred.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_fallback() {
        let negotiated =
            negotiate_protocol_version("2025-11-25", &["2025-11-25", "2025-06-18"], "2025-11-25", true)
                .unwrap();
        assert_eq!(negotiated, "2025-11-25");
    }

    #[test]
    fn unsupported_version_falls_back_when_allowed() {
        let negotiated = negotiate_protocol_version("1999-01-01", &["2025-11-25"], "2025-11-25", true).unwrap();
        assert_eq!(negotiated, "2025-11-25");
    }

    #[test]
    fn unsupported_version_rejected_without_fallback() {
        let err = negotiate_protocol_version("1999-01-01", &["2025-11-25"], "2025-11-25", false).unwrap_err();
        assert!(err.contains("not supported"));
    }
}
