//! The [`ProgressSink`] a peer hands each [`RequestContext`] it creates:
//! reports progress and streaming partials back over the peer's own
//! transport as `notifications/progress` (C11).
//!
//! [`RequestContext`]: mcpeer_core::RequestContext

use std::sync::Arc;

use mcpeer_core::ProgressSink;
use mcpeer_transport::Transport;
use mcpeer_transport_http::{HttpTransport, SessionId};
use mcpeer_wire::{to_string, JsonRpcNotification};
use serde_json::{json, Value};
use tracing::warn;

/// Bridges [`RequestContext::report_progress`]/`send_stream_result` to the
/// wire by serializing a `notifications/progress` and handing it to the
/// owning transport's `send`. Transport sends are fire-and-forget from a
/// handler's point of view: a failed progress send is logged, never
/// propagated, since losing a progress update must not fail the request
/// itself.
///
/// [`RequestContext::report_progress`]: mcpeer_core::RequestContext::report_progress
pub struct TransportProgressSink {
    transport: Arc<dyn Transport>,
}

impl TransportProgressSink {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn send_notification(&self, method: &str, params: Value) {
        let notification = JsonRpcNotification::with_params(method, params);
        let bytes = to_string(&notification).into_bytes();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(error) = transport.send(bytes).await {
                warn!(%error, "failed to deliver progress notification");
            }
        });
    }
}

impl ProgressSink for TransportProgressSink {
    fn send_progress(&self, progress_token: &Value, progress: u8, message: Option<&str>) {
        let mut params = json!({
            "progressToken": progress_token,
            "progress": progress,
        });
        if let Some(message) = message {
            params["message"] = json!(message);
        }
        self.send_notification("notifications/progress", params);
    }

    fn send_stream_result(&self, progress_token: &Value, partial: Value) {
        let params = json!({
            "progressToken": progress_token,
            "partial": partial,
        });
        self.send_notification("notifications/message", params);
    }
}

/// The HTTP-specific counterpart of [`TransportProgressSink`]: progress and
/// streaming frames for a request handled on behalf of one HTTP session
/// must go back to that session's SSE stream only, never fan out to every
/// session the way a broadcast [`mcpeer_transport::Transport::send`] would.
pub struct SessionProgressSink {
    http: Arc<HttpTransport>,
    session_id: SessionId,
}

impl SessionProgressSink {
    pub fn new(http: Arc<HttpTransport>, session_id: SessionId) -> Self {
        Self { http, session_id }
    }

    fn send_notification(&self, method: &str, params: Value) {
        let notification = JsonRpcNotification::with_params(method, params);
        let payload = to_string(&notification);
        if let Err(error) = self.http.send_to_session(&self.session_id, payload) {
            warn!(%error, "failed to deliver progress notification to session");
        }
    }
}

impl ProgressSink for SessionProgressSink {
    fn send_progress(&self, progress_token: &Value, progress: u8, message: Option<&str>) {
        let mut params = json!({
            "progressToken": progress_token,
            "progress": progress,
        });
        if let Some(message) = message {
            params["message"] = json!(message);
        }
        self.send_notification("notifications/progress", params);
    }

    fn send_stream_result(&self, progress_token: &Value, partial: Value) {
        let params = json!({
            "progressToken": progress_token,
            "partial": partial,
        });
        self.send_notification("notifications/message", params);
    }
}
