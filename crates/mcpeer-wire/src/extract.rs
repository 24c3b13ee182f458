//! Best-effort request id recovery from malformed payloads.
//!
//! This is deliberately separate from the structured parser: when a
//! payload fails to parse at all, we still want to echo the originating
//! `id` back in the `-32700` error response where possible. The scan below
//! never panics and never allocates more than the id token itself, even on
//! adversarial or truncated input.

use crate::id::RequestId;

/// Recovers a request id from raw bytes on a best-effort basis.
///
/// Tries a structured JSON parse first; if that succeeds and an `id`
/// field is present, returns it directly. Otherwise falls back to a raw
/// byte scan for an `"id"` key followed by a string or integer literal.
/// Returns `None` if nothing recoverable is found — this function must
/// never throw, even on binary garbage.
pub fn extract_request_id(raw: &[u8]) -> Option<RequestId> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw)
        && let Some(id) = value.get("id")
    {
        match id {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(RequestId::Number(i));
                }
            }
            serde_json::Value::String(s) => return Some(RequestId::String(s.clone())),
            _ => {}
        }
    }

    scan_for_id(raw)
}

/// Scans for the literal token `"id"` followed by `:` and a string or
/// integer value, without requiring the surrounding JSON to be valid.
fn scan_for_id(raw: &[u8]) -> Option<RequestId> {
    const NEEDLE: &[u8] = b"\"id\"";
    let mut search_from = 0usize;

    while let Some(rel) = find_subslice(&raw[search_from..], NEEDLE) {
        let key_start = search_from + rel;
        let mut cursor = key_start + NEEDLE.len();

        // skip whitespace then expect ':'
        while cursor < raw.len() && raw[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= raw.len() || raw[cursor] != b':' {
            search_from = key_start + NEEDLE.len();
            continue;
        }
        cursor += 1;
        while cursor < raw.len() && raw[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= raw.len() {
            return None;
        }

        if raw[cursor] == b'"' {
            let start = cursor + 1;
            let mut end = start;
            while end < raw.len() && raw[end] != b'"' {
                end += 1;
            }
            if end < raw.len() {
                if let Ok(s) = std::str::from_utf8(&raw[start..end]) {
                    return Some(RequestId::String(s.to_string()));
                }
            }
            return None;
        }

        if raw[cursor] == b'-' || raw[cursor].is_ascii_digit() {
            let start = cursor;
            let mut end = start + 1;
            while end < raw.len() && raw[end].is_ascii_digit() {
                end += 1;
            }
            if let Ok(s) = std::str::from_utf8(&raw[start..end])
                && let Ok(n) = s.parse::<i64>()
            {
                return Some(RequestId::Number(n));
            }
            return None;
        }

        // `null` or something unrecognized after "id":
        return None;
    }

    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_integer_id_from_valid_json() {
        let raw = br#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#;
        assert_eq!(extract_request_id(raw), Some(RequestId::Number(42)));
    }

    #[test]
    fn recovers_integer_id_from_truncated_json() {
        let raw = br#"{"jsonrpc":"2.0","id":42,"method":"#;
        assert_eq!(extract_request_id(raw), Some(RequestId::Number(42)));
    }

    #[test]
    fn recovers_string_id() {
        let raw = br#"{"id": "abc-123", "method": "x"}"#;
        assert_eq!(
            extract_request_id(raw),
            Some(RequestId::String("abc-123".to_string()))
        );
    }

    #[test]
    fn returns_none_on_binary_garbage() {
        let raw: &[u8] = &[0xff, 0x00, 0xfe, 0x12, 0x34, 0x00];
        assert_eq!(extract_request_id(raw), None);
    }

    #[test]
    fn returns_none_when_not_json_at_all() {
        assert_eq!(extract_request_id(b"not json"), None);
    }

    #[test]
    fn returns_none_for_null_id() {
        let raw = br#"{"id": null, "method": "x"}"#;
        assert_eq!(extract_request_id(raw), None);
    }
}
