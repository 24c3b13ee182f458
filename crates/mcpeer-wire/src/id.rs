//! Request identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-RPC request identifier.
///
/// Per the JSON-RPC 2.0 spec an id is a string, a number, or null. This type
/// models the two variants a well-formed MCP request actually carries;
/// `null` is never a valid *request* id, only a response-side sentinel for
/// unrecoverable parse errors, represented separately by [`ResponseId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A 64-bit signed integer id.
    Number(i64),
    /// A string id.
    String(String),
}

impl RequestId {
    /// Returns the integer value if this id is a `Number`.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }

    /// Returns the string value if this id is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// The id carried on a response.
///
/// `None` renders as JSON `null` and is only ever produced for a parse
/// error whose originating request id could not be recovered. A response
/// to a well-formed request always echoes that request's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    /// Wraps a known request id.
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    /// The null sentinel used when no id could be recovered.
    pub fn null() -> Self {
        Self(None)
    }

    /// The underlying request id, if any.
    pub fn as_request_id(&self) -> Option<&RequestId> {
        self.0.as_ref()
    }

    /// True for the null sentinel.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

impl From<RequestId> for ResponseId {
    fn from(id: RequestId) -> Self {
        Self::from_request(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_string_ids_are_never_equal() {
        let n = RequestId::Number(1);
        let s = RequestId::String("1".to_string());
        assert_ne!(n, s);
    }

    #[test]
    fn response_id_null_round_trips() {
        let null = ResponseId::null();
        let json = serde_json::to_value(&null).unwrap();
        assert_eq!(json, serde_json::Value::Null);
        let back: ResponseId = serde_json::from_value(json).unwrap();
        assert!(back.is_null());
    }

    #[test]
    fn response_id_echoes_request_id() {
        let id = RequestId::Number(42);
        let resp = ResponseId::from(id.clone());
        assert_eq!(resp.as_request_id(), Some(&id));
    }
}
