//! JSON-RPC 2.0 request/response/notification envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, ParseError, ParseErrorKind};
use crate::extract::extract_request_id;
use crate::id::{RequestId, ResponseId};

/// The literal `"2.0"` JSON-RPC version marker.
///
/// Serializes as the string `"2.0"`; deserializing anything else fails,
/// which is how malformed-version payloads get rejected during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRpcVersion;

const VERSION: &str = "2.0";

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == VERSION {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "invalid jsonrpc version: expected \"2.0\", got {s:?}"
            )))
        }
    }
}

/// A JSON-RPC request: a method call that expects a correlated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Builds a request with no params.
    pub fn new(id: RequestId, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: None,
            id,
        }
    }

    /// Builds a request carrying params.
    pub fn with_params(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: Some(params),
            id,
        }
    }
}

/// A JSON-RPC notification: a method call with no id and no response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Builds a notification with no params.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: None,
        }
    }

    /// Builds a notification carrying params.
    pub fn with_params(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// The mutually exclusive payload of a response: a result or an error,
/// never both, never neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

/// A JSON-RPC response correlated to a prior request by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    pub id: ResponseId,
}

impl JsonRpcResponse {
    /// Builds a success response echoing `id`.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from_request(id),
        }
    }

    /// Builds an error response echoing `id`.
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::from_request(id),
        }
    }

    /// Builds an error response with no recoverable id (parse errors only).
    pub fn error_without_id(error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::null(),
        }
    }

    /// `true` if this response carries a successful result.
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }
}

/// A parsed inbound message: either a request or a notification,
/// distinguished structurally by the presence of `id`.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

/// Parses a JSON value as an inbound request or notification.
///
/// A payload with `method` and no `id` is accepted as a notification,
/// never an error — per the wire contract, notifications are a distinct
/// tag, not a malformed request.
pub fn parse_request(json: &Value) -> Result<JsonRpcMessage, ParseError> {
    let obj = json
        .as_object()
        .ok_or_else(|| ParseError::new(ParseErrorKind::NotJson))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        _ => return Err(ParseError::new(ParseErrorKind::InvalidJsonRpcVersion)),
    }

    let method = obj
        .get("method")
        .ok_or(ParseError::new(ParseErrorKind::MissingField("method")))?
        .as_str()
        .ok_or(ParseError::new(ParseErrorKind::WrongType("method")))?;

    if method.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingField("method")));
    }

    let params = match obj.get("params") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    };

    match obj.get("id") {
        None => Ok(JsonRpcMessage::Notification(JsonRpcNotification {
            jsonrpc: JsonRpcVersion,
            method: method.to_string(),
            params,
        })),
        Some(id_value) => {
            let id: RequestId = serde_json::from_value(id_value.clone())
                .map_err(|_| ParseError::new(ParseErrorKind::WrongType("id")))?;
            Ok(JsonRpcMessage::Request(JsonRpcRequest {
                jsonrpc: JsonRpcVersion,
                method: method.to_string(),
                params,
                id,
            }))
        }
    }
}

/// Parses a JSON value as a response, enforcing result/error exclusivity.
pub fn parse_response(json: &Value) -> Result<JsonRpcResponse, ParseError> {
    let obj = json
        .as_object()
        .ok_or_else(|| ParseError::new(ParseErrorKind::NotJson))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        _ => return Err(ParseError::new(ParseErrorKind::InvalidJsonRpcVersion)),
    }

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");
    if has_result == has_error {
        return Err(ParseError::new(ParseErrorKind::ResultErrorExclusivity));
    }

    let payload = if has_result {
        JsonRpcResponsePayload::Success {
            result: obj.get("result").cloned().unwrap_or(Value::Null),
        }
    } else {
        let error: JsonRpcError = serde_json::from_value(
            obj.get("error").cloned().unwrap_or(Value::Null),
        )
        .map_err(|_| ParseError::new(ParseErrorKind::WrongType("error")))?;
        JsonRpcResponsePayload::Error { error }
    };

    let id = match obj.get("id") {
        None | Some(Value::Null) => ResponseId::null(),
        Some(id_value) => {
            let id: RequestId = serde_json::from_value(id_value.clone())
                .map_err(|_| ParseError::new(ParseErrorKind::WrongType("id")))?;
            ResponseId::from_request(id)
        }
    };

    Ok(JsonRpcResponse {
        jsonrpc: JsonRpcVersion,
        payload,
        id,
    })
}

/// Parses raw bytes as any JSON-RPC message shape, attaching a best-effort
/// recovered id to any parse failure.
pub fn parse_message(raw: &[u8]) -> Result<JsonRpcMessage, ParseError> {
    let json: Value = serde_json::from_slice(raw).map_err(|_| {
        ParseError::new(ParseErrorKind::NotJson).with_extracted_id(extract_request_id(raw))
    })?;

    let has_result_or_error =
        json.get("result").is_some() || json.get("error").is_some();
    if has_result_or_error {
        return parse_response(&json)
            .map(JsonRpcMessage::Response)
            .map_err(|e| e.with_extracted_id(extract_request_id(raw)));
    }

    parse_request(&json).map_err(|e| e.with_extracted_id(extract_request_id(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_requires_id_notification_does_not() {
        let req = json!({"jsonrpc":"2.0","id":1,"method":"ping"});
        match parse_request(&req).unwrap() {
            JsonRpcMessage::Request(r) => assert_eq!(r.method, "ping"),
            _ => panic!("expected request"),
        }

        let notif = json!({"jsonrpc":"2.0","method":"notifications/initialized"});
        match parse_request(&notif).unwrap() {
            JsonRpcMessage::Notification(n) => {
                assert_eq!(n.method, "notifications/initialized")
            }
            _ => panic!("expected notification"),
        }
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let req = json!({"jsonrpc":"1.0","id":1,"method":"ping"});
        assert!(matches!(
            parse_request(&req).unwrap_err().kind,
            ParseErrorKind::InvalidJsonRpcVersion
        ));
    }

    #[test]
    fn rejects_empty_method() {
        let req = json!({"jsonrpc":"2.0","id":1,"method":""});
        assert!(parse_request(&req).is_err());
    }

    #[test]
    fn response_requires_exactly_one_of_result_or_error() {
        let both = json!({"jsonrpc":"2.0","id":1,"result":{},"error":{"code":-1,"message":"x"}});
        assert!(matches!(
            parse_response(&both).unwrap_err().kind,
            ParseErrorKind::ResultErrorExclusivity
        ));

        let neither = json!({"jsonrpc":"2.0","id":1});
        assert!(matches!(
            parse_response(&neither).unwrap_err().kind,
            ParseErrorKind::ResultErrorExclusivity
        ));
    }

    #[test]
    fn response_id_echoes_request() {
        let resp = json!({"jsonrpc":"2.0","id":"abc","result":{"ok":true}});
        let parsed = parse_response(&resp).unwrap();
        assert_eq!(parsed.id.as_request_id(), Some(&RequestId::String("abc".into())));
        assert!(parsed.is_success());
    }

    #[test]
    fn success_response_serializes_without_error_field() {
        let resp = JsonRpcResponse::success(RequestId::Number(5), json!({"x":1}));
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("error").is_none());
        assert_eq!(v["result"]["x"], 1);
        assert_eq!(v["id"], 5);
    }
}
