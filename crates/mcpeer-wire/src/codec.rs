//! Unframed serialization helpers.
//!
//! These produce *unframed* JSON text; the framing boundary (newline,
//! Content-Length, SSE `data:` line) belongs to the transport, not here.
//! `to_string_delimited` exists only because newline-delimited transports
//! need a trailing `\n` on the wire and should get it from one place
//! instead of each transport appending its own.

use serde::Serialize;

/// Serializes a message to compact, unframed JSON text.
pub fn to_string<T: Serialize>(msg: &T) -> String {
    serde_json::to_string(msg).expect("wire types are always serializable")
}

/// Serializes a message to JSON text with a trailing newline, for
/// newline-delimited transports.
pub fn to_string_delimited<T: Serialize>(msg: &T) -> String {
    let mut s = to_string(msg);
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::RequestId;
    use crate::message::{JsonRpcRequest, parse_request};

    #[test]
    fn delimited_round_trips_after_splitting_on_newline() {
        let req = JsonRpcRequest::new(RequestId::Number(7), "ping");
        let framed = to_string_delimited(&req);
        assert!(framed.ends_with('\n'));
        let line = framed.trim_end_matches('\n');
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        let parsed = parse_request(&value).unwrap();
        match parsed {
            crate::message::JsonRpcMessage::Request(r) => assert_eq!(r.id, req.id),
            _ => panic!("expected request"),
        }
    }
}
