//! Server-Sent Events formatting (C7).
//!
//! `format_event` writes `data:` line first, `id:` line second (omitted
//! entirely when there's no id), terminated by a blank line. The embedder
//! is responsible for setting the response
//! headers named in [`CONTENT_TYPE`]/[`CACHE_CONTROL`]/[`CONNECTION`].

/// `Content-Type` header value the embedder must set on the SSE response.
pub const CONTENT_TYPE: &str = "text/event-stream";
/// `Cache-Control` header value the embedder must set on the SSE response.
pub const CACHE_CONTROL: &str = "no-cache";
/// `Connection` header value the embedder must set on the SSE response.
pub const CONNECTION: &str = "keep-alive";

/// Formats one SSE frame: `data: <json>\nid: <id>\n\n`, with the `id:`
/// line omitted when `event_id` is `None`.
pub fn format_event(json_payload: &str, event_id: Option<u64>) -> String {
    let mut out = String::with_capacity(json_payload.len() + 32);
    for line in json_payload.lines() {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    if json_payload.is_empty() {
        out.push_str("data: \n");
    }
    if let Some(id) = event_id {
        out.push_str("id: ");
        out.push_str(&id.to_string());
        out.push('\n');
    }
    out.push('\n');
    out
}

/// A keepalive comment frame, ignored by clients but keeps the connection
/// from being reaped by an idle-timing proxy.
pub fn format_keepalive() -> &'static str {
    ":\n\n"
}
