//! The peer/session engine (C8): couples a transport with a
//! [`RequestTracker`], a [`TimeoutManager`], and a [`RequestHandler`],
//! then drives the initialize handshake, correlated dispatch, inbound
//! cancellation, and shutdown.
//!
//! The same engine serves both roles symmetrically: a client-role `Peer`
//! sends `initialize` and awaits it; a server-role `Peer` receives it and
//! answers it. Everything past the handshake — send/receive correlation,
//! timeouts, cancellation — works identically either way, which is why
//! there is one `Peer` type rather than a `ClientPeer`/`ServerPeer` pair.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcpeer_core::{
    CoreConfig, ErrorCallback, NullProgressSink, PendingError, ProgressSink, RequestContext,
    RequestTracker, SuccessCallback, TimeoutManager,
};
use mcpeer_transport::{Transport, TransportError};
use mcpeer_transport_http::{HttpTransport, SessionId};
use mcpeer_wire::{
    parse_message, to_string, JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, RequestId, PROTOCOL_VERSION,
};

use crate::capabilities::{
    negotiate_protocol_version, ClientCapabilities, Implementation, InitializeParams,
    InitializeResult, PeerInfo,
};
use crate::error::PeerError;
use crate::handler::{NotificationHandler, NullNotificationHandler, RequestHandler};
use crate::progress::{SessionProgressSink, TransportProgressSink};

/// The identity attributed to every subscriber/origin on a transport with
/// no concept of multiple sessions (stdio, or an HTTP transport's
/// un-targeted broadcast path): a fixed constant stands in for a session
/// id on transports that never had one.
pub const DEFAULT_ORIGIN: &str = "default";

/// A handler for progress notifications arriving for one of *our* own
/// outbound requests, registered via [`Peer::on_progress`].
pub type ProgressCallback = Box<dyn Fn(u8, Option<String>) + Send + Sync>;

fn value_to_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

fn request_id_to_value(id: &RequestId) -> Value {
    match id {
        RequestId::Number(n) => Value::from(*n),
        RequestId::String(s) => Value::from(s.clone()),
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    http: Option<Arc<HttpTransport>>,
    tracker: Arc<RequestTracker>,
    timeouts: Arc<TimeoutManager>,
    core: CoreConfig,
    local_info: Implementation,
    instructions: Option<String>,
    supported_versions: Vec<String>,
    preferred_version: String,
    allow_version_fallback: bool,
    request_handler: Option<Arc<dyn RequestHandler>>,
    notification_handler: Arc<dyn NotificationHandler>,
    peer_info: RwLock<Option<PeerInfo>>,
    progress_callbacks: Mutex<HashMap<RequestId, ProgressCallback>>,
    inbound_cancellation: Mutex<HashMap<RequestId, Arc<AtomicBool>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            debug!("peer dropped without calling close()");
        }
    }
}

/// The peer/session engine. Cheap to clone — every clone shares the same
/// transport, tracker, and timeout manager via the inner `Arc`.
#[derive(Clone)]
pub struct Peer(Arc<Inner>);

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("pending", &self.0.tracker.pending_count())
            .field("closed", &self.0.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Peer {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        http: Option<Arc<HttpTransport>>,
        local_info: Implementation,
        instructions: Option<String>,
        core: CoreConfig,
        supported_versions: Vec<String>,
        preferred_version: String,
        allow_version_fallback: bool,
        request_handler: Option<Arc<dyn RequestHandler>>,
        notification_handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        Self(Arc::new(Inner {
            transport,
            http,
            tracker: Arc::new(RequestTracker::new()),
            timeouts: Arc::new(TimeoutManager::new()),
            core,
            local_info,
            instructions,
            supported_versions,
            preferred_version,
            allow_version_fallback,
            request_handler,
            notification_handler,
            peer_info: RwLock::new(None),
            progress_callbacks: Mutex::new(HashMap::new()),
            inbound_cancellation: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }

    /// Registers the engine's callbacks with the transport and connects
    /// it, then starts the background timeout sweeper. Callback
    /// registration must happen before `connect()` — this method preserves
    /// that order so no inbound message is ever dropped for lack of a
    /// registered callback.
    pub async fn connect(&self) -> Result<(), PeerError> {
        let inner = self.0.clone();

        if let Some(http) = &inner.http {
            let dispatch_inner = inner.clone();
            http.set_session_message_callback(Box::new(move |session_id, bytes| {
                let inner = dispatch_inner.clone();
                tokio::spawn(async move {
                    Self::dispatch_inbound(inner, session_id.as_str().to_string(), bytes).await;
                });
            }));
        } else {
            let dispatch_inner = inner.clone();
            inner.transport.set_message_callback(Box::new(move |bytes| {
                let inner = dispatch_inner.clone();
                tokio::spawn(async move {
                    Self::dispatch_inbound(inner, DEFAULT_ORIGIN.to_string(), bytes).await;
                });
            }));
        }

        let error_inner = inner.clone();
        inner.transport.set_error_callback(Box::new(move |error| {
            let inner = error_inner.clone();
            tokio::spawn(async move {
                warn!(%error, "transport error; cancelling all pending requests");
                inner.tracker.cancel_all(|| PendingError::Transport(error.to_string()));
            });
        }));

        inner.transport.connect().await?;

        let sweep_manager = inner.timeouts.clone();
        let sweep_interval = inner.core.timeout_sweep_interval;
        let handle = tokio::spawn(mcpeer_core::run_sweeper(sweep_manager, sweep_interval));
        *inner.sweeper.lock() = Some(handle);

        Ok(())
    }

    /// The negotiated handshake outcome, once `initialize` has completed
    /// in either role. `None` before that point.
    pub fn peer_info(&self) -> Option<PeerInfo> {
        self.0.peer_info.read().clone()
    }

    /// Client-role handshake: sends `initialize`, validates the server's
    /// protocol version, stores the negotiated [`PeerInfo`], and sends
    /// `notifications/initialized`.
    pub async fn initialize(&self, capabilities: ClientCapabilities) -> Result<InitializeResult, PeerError> {
        let params = InitializeParams {
            protocol_version: self.0.preferred_version.clone(),
            capabilities: capabilities.clone(),
            client_info: self.0.local_info.clone(),
        };
        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(&params)?), None)
            .await?;

        let supported: Vec<&str> = self.0.supported_versions.iter().map(String::as_str).collect();
        if result.protocol_version != self.0.preferred_version && !supported.contains(&result.protocol_version.as_str()) {
            return Err(PeerError::VersionMismatch(result.protocol_version));
        }

        *self.0.peer_info.write() = Some(PeerInfo {
            protocol_version: result.protocol_version.clone(),
            client_capabilities: capabilities,
            client_info: Some(self.0.local_info.clone()),
            server_capabilities: result.capabilities.clone(),
            server_info: Some(result.server_info.clone()),
        });

        self.send_notification("notifications/initialized", None).await?;
        Ok(result)
    }

    /// Sends a request with explicit, owned terminal callbacks: allocate
    /// id, register pending, arm timeout, serialize, send. Returns the
    /// allocated id immediately; the
    /// callbacks fire exactly once, either from the dispatch loop or from
    /// this call itself if the send fails outright.
    pub async fn send_request_with_callbacks(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout: Option<Duration>,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> RequestId {
        let inner = &self.0;
        let id = inner.tracker.next_id();

        if inner.closed.load(Ordering::SeqCst) {
            on_error(PendingError::Transport("peer is closed".to_string()));
            return id;
        }

        inner
            .tracker
            .register(id.clone(), on_success, on_error)
            .expect("freshly allocated id cannot already be pending");

        let duration = timeout.unwrap_or(inner.core.default_request_timeout);
        let tracker = inner.tracker.clone();
        let expire_id = id.clone();
        inner.timeouts.arm(
            id.clone(),
            duration,
            Box::new(move |_| tracker.cancel(&expire_id, PendingError::Timeout)),
        );

        let method = method.into();
        let message = match params {
            Some(p) => JsonRpcRequest::with_params(id.clone(), method, p),
            None => JsonRpcRequest::new(id.clone(), method),
        };
        let bytes = to_string(&message).into_bytes();

        if let Err(error) = inner.transport.send(bytes).await {
            inner.timeouts.cancel(&id);
            inner.tracker.cancel(&id, PendingError::Transport(error.to_string()));
        }

        id
    }

    /// Convenience wrapper around [`Self::send_request_with_callbacks`]
    /// that awaits the response and deserializes its result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<R, PeerError> {
        let (tx, rx) = oneshot::channel::<Result<Value, PeerError>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_success = tx.clone();
        let tx_error = tx.clone();

        self.send_request_with_callbacks(
            method,
            params,
            timeout,
            Box::new(move |value| {
                if let Some(tx) = tx_success.lock().take() {
                    let _ = tx.send(Ok(value));
                }
            }),
            Box::new(move |error| {
                if let Some(tx) = tx_error.lock().take() {
                    let _ = tx.send(Err(PeerError::from(error)));
                }
            }),
        )
        .await;

        let value = rx.await.map_err(|_| PeerError::Closed)??;
        serde_json::from_value(value).map_err(|e| PeerError::Transport(TransportError::Framing(e.to_string())))
    }

    /// Retries [`Self::request`] under `policy`, for explicit user-level
    /// operations only — this is never applied to protocol traffic
    /// automatically, only when an
    /// embedder opts a specific call into it (e.g. a flaky `tools/call`
    /// against a remote server).
    pub async fn request_with_retry<R: DeserializeOwned>(
        &self,
        method: impl Into<String> + Clone,
        params: Option<Value>,
        timeout: Option<Duration>,
        policy: &dyn mcpeer_core::RetryPolicy,
        max_attempts: u32,
    ) -> Result<R, PeerError> {
        mcpeer_core::retry_with_backoff(
            move || {
                let method = method.clone();
                let params = params.clone();
                async move { self.request(method, params, timeout).await }
            },
            policy,
            max_attempts,
        )
        .await
    }

    /// Sends a notification (no id, no response expected).
    pub async fn send_notification(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), PeerError> {
        if self.0.closed.load(Ordering::SeqCst) {
            return Err(PeerError::Closed);
        }
        let notification = match params {
            Some(p) => JsonRpcNotification::with_params(method, p),
            None => JsonRpcNotification::new(method),
        };
        let bytes = to_string(&notification).into_bytes();
        self.0.transport.send(bytes).await.map_err(PeerError::from)
    }

    /// Registers a callback to receive `notifications/progress` for one of
    /// our own outbound requests, keyed by the request's [`RequestId`] —
    /// this only works when the caller's `_meta.progressToken` is that
    /// id's wire representation, which [`Self::request`]/
    /// [`Self::send_request_with_callbacks`] don't set automatically;
    /// callers that want progress must include it in `params` themselves.
    pub fn on_progress(&self, id: RequestId, callback: ProgressCallback) {
        self.0.progress_callbacks.lock().insert(id, callback);
    }

    /// Cancels an outbound request: removes it from the tracker (invoking
    /// its error callback with [`PendingError::Cancelled`]), disarms its
    /// timeout, and emits `notifications/cancelled`.
    pub async fn cancel(&self, id: RequestId, reason: impl Into<String>) {
        let reason = reason.into();
        self.0.timeouts.cancel(&id);
        self.0.progress_callbacks.lock().remove(&id);
        self.0.tracker.cancel(&id, PendingError::Cancelled(reason.clone()));
        let params = serde_json::json!({ "requestId": request_id_to_value(&id), "reason": reason });
        let _ = self.send_notification("notifications/cancelled", Some(params)).await;
    }

    /// Fans `notifications/resources/updated` out to every subscriber of
    /// `uri`, each delivered over the transport (or HTTP session) that
    /// subscriber is associated with.
    pub async fn notify_resource_updated(&self, resources: &mcpeer_server::ResourceRegistry, uri: impl Into<String>) {
        let uri = uri.into();
        let subscribers = resources.subscribers(&uri);
        let params = serde_json::json!({ "uri": uri });
        for subscriber in subscribers {
            let notification = JsonRpcNotification::with_params("notifications/resources/updated", params.clone());
            self.0.send_raw(&subscriber, to_string(&notification).into_bytes()).await;
        }
    }

    /// Removes every subscription belonging to a terminated session,
    /// atomically.
    pub fn handle_session_terminated(&self, resources: &mcpeer_server::ResourceRegistry, session_id: &str) {
        resources.remove_subscriber(session_id);
    }

    /// Broadcasts `notifications/tools/list_changed` to every connected
    /// peer/session.
    pub async fn notify_tools_list_changed(&self) {
        self.broadcast_notification("notifications/tools/list_changed").await;
    }

    /// Broadcasts `notifications/resources/list_changed`.
    pub async fn notify_resources_list_changed(&self) {
        self.broadcast_notification("notifications/resources/list_changed").await;
    }

    /// Broadcasts `notifications/prompts/list_changed`.
    pub async fn notify_prompts_list_changed(&self) {
        self.broadcast_notification("notifications/prompts/list_changed").await;
    }

    async fn broadcast_notification(&self, method: &str) {
        let notification = JsonRpcNotification::new(method);
        let bytes = to_string(&notification).into_bytes();
        if let Err(error) = self.0.transport.send(bytes).await {
            warn!(%error, method, "failed to broadcast notification");
        }
    }

    /// Disconnects the transport, cancels every pending request and
    /// armed timeout, and stops the background sweeper. Idempotent.
    pub async fn close(&self) -> Result<(), PeerError> {
        if self.0.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.0.tracker.cancel_all(|| PendingError::Cancelled("peer closed".to_string()));
        if let Some(handle) = self.0.sweeper.lock().take() {
            handle.abort();
        }
        self.0.transport.disconnect().await.map_err(PeerError::from)
    }

    pub fn pending_request_count(&self) -> usize {
        self.0.tracker.pending_count()
    }

    async fn dispatch_inbound(inner: Arc<Inner>, origin: String, bytes: Vec<u8>) {
        match parse_message(&bytes) {
            Ok(JsonRpcMessage::Response(response)) => Self::handle_response(&inner, response),
            Ok(JsonRpcMessage::Notification(notification)) => {
                Self::handle_notification(&inner, &origin, notification)
            }
            Ok(JsonRpcMessage::Request(request)) => Self::handle_request(inner, origin, request).await,
            Err(parse_error) => {
                warn!(kind = %parse_error.kind, "failed to parse inbound message");
                let response = match parse_error.extracted_id.clone() {
                    Some(id) => JsonRpcResponse::error(id, parse_error.to_error_object()),
                    None => JsonRpcResponse::error_without_id(parse_error.to_error_object()),
                };
                inner.send_raw(&origin, to_string(&response).into_bytes()).await;
            }
        }
    }

    fn handle_response(inner: &Inner, response: JsonRpcResponse) {
        let Some(id) = response.id.as_request_id().cloned() else {
            return;
        };
        inner.timeouts.cancel(&id);
        inner.progress_callbacks.lock().remove(&id);
        match response.payload {
            JsonRpcResponsePayload::Success { result } => {
                inner.tracker.complete(&id, result);
            }
            JsonRpcResponsePayload::Error { error } => {
                inner.tracker.complete_with_error(&id, error);
            }
        }
    }

    fn handle_notification(inner: &Inner, origin: &str, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/progress" => {
                let Some(params) = &notification.params else { return };
                let Some(token) = params.get("progressToken") else { return };
                let Some(id) = value_to_request_id(token) else { return };
                inner.timeouts.reset_to_original(&id);
                if let Some(callback) = inner.progress_callbacks.lock().get(&id) {
                    let progress = params.get("progress").and_then(Value::as_u64).unwrap_or(0) as u8;
                    let message = params.get("message").and_then(Value::as_str).map(str::to_string);
                    callback(progress, message);
                }
            }
            "notifications/cancelled" => {
                let Some(params) = &notification.params else { return };
                let Some(id_value) = params.get("requestId") else { return };
                let Some(id) = value_to_request_id(id_value) else { return };
                if let Some(flag) = inner.inbound_cancellation.lock().get(&id) {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            "notifications/initialized" => {
                debug!(origin, "peer signalled initialized");
            }
            other => inner.notification_handler.handle(other, notification.params),
        }
    }

    async fn handle_request(inner: Arc<Inner>, origin: String, request: JsonRpcRequest) {
        if request.method == "initialize" {
            Self::handle_initialize(&inner, &origin, request).await;
            return;
        }

        let Some(handler) = inner.request_handler.clone() else {
            let error = JsonRpcError::new(
                JsonRpcErrorCode::MethodNotFound,
                format!("method not found: {}", request.method),
            );
            inner.respond_error(&origin, request.id, error).await;
            return;
        };

        let progress_token = request
            .params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|meta| meta.get("progressToken"))
            .cloned();
        let sink = inner.progress_sink_for(&origin);
        let ctx = RequestContext::new(request.id.clone(), progress_token, sink, Some(inner.timeouts.clone()));
        let cancel_handle = ctx.cancellation_handle();
        inner.inbound_cancellation.lock().insert(request.id.clone(), cancel_handle);

        let result = handler.handle(request.method, request.params, ctx, origin.clone()).await;
        inner.inbound_cancellation.lock().remove(&request.id);

        match result {
            Ok(value) => inner.respond_success(&origin, request.id, value).await,
            Err(error) => inner.respond_error(&origin, request.id, error).await,
        }
    }

    async fn handle_initialize(inner: &Arc<Inner>, origin: &str, request: JsonRpcRequest) {
        let params: InitializeParams = match request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
        {
            Ok(Some(params)) => params,
            Ok(None) => {
                let error = JsonRpcError::new(JsonRpcErrorCode::InvalidParams, "initialize requires params");
                inner.respond_error(origin, request.id, error).await;
                return;
            }
            Err(e) => {
                let error = JsonRpcError::new(JsonRpcErrorCode::InvalidParams, format!("invalid initialize params: {e}"));
                inner.respond_error(origin, request.id, error).await;
                return;
            }
        };

        let supported: Vec<&str> = inner.supported_versions.iter().map(String::as_str).collect();
        match negotiate_protocol_version(
            &params.protocol_version,
            &supported,
            &inner.preferred_version,
            inner.allow_version_fallback,
        ) {
            Ok(version) => {
                let server_capabilities = inner
                    .request_handler
                    .as_ref()
                    .map(|h| h.capabilities())
                    .unwrap_or_default();
                let result = InitializeResult {
                    protocol_version: version.clone(),
                    capabilities: server_capabilities.clone(),
                    server_info: inner.local_info.clone(),
                    instructions: inner.instructions.clone(),
                };
                *inner.peer_info.write() = Some(PeerInfo {
                    protocol_version: version,
                    client_capabilities: params.capabilities,
                    client_info: Some(params.client_info),
                    server_capabilities,
                    server_info: Some(inner.local_info.clone()),
                });
                let value = serde_json::to_value(result).expect("InitializeResult always serializes");
                inner.respond_success(origin, request.id, value).await;
            }
            Err(reason) => {
                let error = JsonRpcError::new(JsonRpcErrorCode::InvalidRequest, reason);
                inner.respond_error(origin, request.id, error).await;
                // A version mismatch closes the session.
                inner.closed.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Inner {
    fn progress_sink_for(&self, origin: &str) -> Arc<dyn ProgressSink> {
        if let Some(http) = &self.http {
            if let Some(session_id) = SessionId::parse(origin) {
                return Arc::new(SessionProgressSink::new(http.clone(), session_id));
            }
        }
        if self.http.is_some() {
            return Arc::new(NullProgressSink);
        }
        Arc::new(TransportProgressSink::new(self.transport.clone()))
    }

    async fn respond_success(&self, origin: &str, id: RequestId, result: Value) {
        let response = JsonRpcResponse::success(id, result);
        self.send_raw(origin, to_string(&response).into_bytes()).await;
    }

    async fn respond_error(&self, origin: &str, id: RequestId, error: JsonRpcError) {
        let response = JsonRpcResponse::error(id, error);
        self.send_raw(origin, to_string(&response).into_bytes()).await;
    }

    /// Delivers `payload` to a specific origin: a targeted HTTP session
    /// send when the transport is HTTP and `origin` names a live session,
    /// otherwise the transport's generic (single-peer or broadcast) send.
    async fn send_raw(&self, origin: &str, payload: Vec<u8>) {
        let result = match (&self.http, SessionId::parse(origin)) {
            (Some(http), Some(session_id)) => {
                let body = String::from_utf8_lossy(&payload).into_owned();
                http.send_to_session(&session_id, body)
                    .map(|_event_id| ())
                    .map_err(|e| TransportError::SendFailed(e.to_string()))
            }
            _ => self.transport.send(payload).await,
        };
        if let Err(error) = result {
            warn!(%error, origin, "failed to deliver message");
        }
    }
}

/// Builds a [`Peer`]: wires the transport, local identity, capability
/// negotiation parameters, and request/notification handlers together.
pub struct PeerBuilder {
    transport: Arc<dyn Transport>,
    http: Option<Arc<HttpTransport>>,
    local_info: Implementation,
    instructions: Option<String>,
    core: CoreConfig,
    supported_versions: Vec<String>,
    preferred_version: String,
    allow_version_fallback: bool,
    request_handler: Option<Arc<dyn RequestHandler>>,
    notification_handler: Arc<dyn NotificationHandler>,
}

impl PeerBuilder {
    /// Starts from a generic transport (use [`Self::http_transport`]
    /// instead when the transport is [`HttpTransport`], so the engine can
    /// target sends at individual sessions).
    pub fn new(transport: Arc<dyn Transport>, local_info: Implementation) -> Self {
        Self {
            transport,
            http: None,
            local_info,
            instructions: None,
            core: CoreConfig::default(),
            supported_versions: vec![PROTOCOL_VERSION.to_string()],
            preferred_version: PROTOCOL_VERSION.to_string(),
            allow_version_fallback: false,
            request_handler: None,
            notification_handler: Arc::new(NullNotificationHandler),
        }
    }

    /// Uses an [`HttpTransport`], enabling session-targeted sends for
    /// responses, progress, and subscription fan-out.
    pub fn http_transport(mut self, http: Arc<HttpTransport>) -> Self {
        self.transport = http.clone();
        self.http = Some(http);
        self
    }

    pub fn request_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.request_handler = Some(handler);
        self
    }

    pub fn notification_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.notification_handler = handler;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn core_config(mut self, core: CoreConfig) -> Self {
        self.core = core;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.core.default_request_timeout = timeout;
        self
    }

    pub fn allow_version_fallback(mut self, allow: bool) -> Self {
        self.allow_version_fallback = allow;
        self
    }

    pub fn supported_versions(mut self, versions: Vec<String>) -> Self {
        self.supported_versions = versions;
        self
    }

    pub fn build(self) -> Peer {
        Peer::new(
            self.transport,
            self.http,
            self.local_info,
            self.instructions,
            self.core,
            self.supported_versions,
            self.preferred_version,
            self.allow_version_fallback,
            self.request_handler,
            self.notification_handler,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    /// An in-memory duplex transport pair for exercising the engine
    /// without a real subprocess or socket: `send` on one half delivers
    /// straight into the other half's message callback.
    struct LoopbackTransport {
        outbox: mpsc::UnboundedSender<Vec<u8>>,
        connected: AtomicBool,
        message_cb: Mutex<Option<mcpeer_transport::MessageCallback>>,
        error_cb: Mutex<Option<mcpeer_transport::ErrorCallback>>,
    }

    impl LoopbackTransport {
        fn pair() -> (Arc<Self>, Arc<Self>) {
            let (tx_a, mut rx_a) = mpsc::unbounded_channel::<Vec<u8>>();
            let (tx_b, mut rx_b) = mpsc::unbounded_channel::<Vec<u8>>();

            let a = Arc::new(Self {
                outbox: tx_b,
                connected: AtomicBool::new(false),
                message_cb: Mutex::new(None),
                error_cb: Mutex::new(None),
            });
            let b = Arc::new(Self {
                outbox: tx_a,
                connected: AtomicBool::new(false),
                message_cb: Mutex::new(None),
                error_cb: Mutex::new(None),
            });

            let a2 = a.clone();
            tokio::spawn(async move {
                while let Some(bytes) = rx_a.recv().await {
                    if let Some(cb) = a2.message_cb.lock().as_ref() {
                        cb(bytes);
                    }
                }
            });
            let b2 = b.clone();
            tokio::spawn(async move {
                while let Some(bytes) = rx_b.recv().await {
                    if let Some(cb) = b2.message_cb.lock().as_ref() {
                        cb(bytes);
                    }
                }
            });

            (a, b)
        }
    }

    #[async_trait::async_trait]
    impl Transport for LoopbackTransport {
        fn kind(&self) -> mcpeer_transport::TransportKind {
            mcpeer_transport::TransportKind::Stdio
        }

        async fn connect(&self) -> mcpeer_transport::TransportResult<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> mcpeer_transport::TransportResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send(&self, message: Vec<u8>) -> mcpeer_transport::TransportResult<()> {
            let _ = self.outbox.send(message);
            Ok(())
        }

        fn set_message_callback(&self, callback: mcpeer_transport::MessageCallback) {
            *self.message_cb.lock() = Some(callback);
        }

        fn set_error_callback(&self, callback: mcpeer_transport::ErrorCallback) {
            *self.error_cb.lock() = Some(callback);
        }
    }

    struct EchoHandler;

    impl RequestHandler for EchoHandler {
        fn handle(
            &self,
            method: String,
            params: Option<Value>,
            _ctx: RequestContext,
            _origin: String,
        ) -> futures::future::BoxFuture<'static, Result<Value, JsonRpcError>> {
            Box::pin(async move {
                match method.as_str() {
                    "ping" => Ok(serde_json::json!({})),
                    "echo" => Ok(params.unwrap_or(Value::Null)),
                    other => Err(JsonRpcError::new(
                        JsonRpcErrorCode::MethodNotFound,
                        format!("no such method: {other}"),
                    )),
                }
            })
        }
    }

    fn implementation() -> Implementation {
        Implementation::new("test-peer", "0.1.0")
    }

    #[tokio::test]
    async fn send_response_correlation_ping() {
        let (client_transport, server_transport) = LoopbackTransport::pair();

        let client = PeerBuilder::new(client_transport, implementation()).build();
        let server = PeerBuilder::new(server_transport, implementation())
            .request_handler(Arc::new(EchoHandler))
            .build();

        client.connect().await.unwrap();
        server.connect().await.unwrap();

        let result: Value = client.request("ping", None, None).await.unwrap();
        assert_eq!(result, serde_json::json!({}));
        assert_eq!(client.pending_request_count(), 0);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (client_transport, server_transport) = LoopbackTransport::pair();
        let client = PeerBuilder::new(client_transport, implementation()).build();
        let server = PeerBuilder::new(server_transport, implementation())
            .request_handler(Arc::new(EchoHandler))
            .build();
        client.connect().await.unwrap();
        server.connect().await.unwrap();

        let err = client
            .request::<Value>("nonexistent", None, None)
            .await
            .unwrap_err();
        match err {
            PeerError::Protocol(e) => assert_eq!(e.code, JsonRpcErrorCode::MethodNotFound.code()),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handshake_negotiates_protocol_version() {
        let (client_transport, server_transport) = LoopbackTransport::pair();
        let client = PeerBuilder::new(client_transport, Implementation::new("client", "1.0")).build();
        let server = PeerBuilder::new(server_transport, Implementation::new("server", "1.0"))
            .request_handler(Arc::new(EchoHandler))
            .build();
        client.connect().await.unwrap();
        server.connect().await.unwrap();

        let result = client.initialize(ClientCapabilities::default()).await.unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert!(client.peer_info().is_some());

        // Give the server a beat to observe notifications/initialized.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(server.peer_info().is_some());
    }

    #[tokio::test]
    async fn timeout_fires_when_no_response_arrives() {
        let (client_transport, _server_transport) = LoopbackTransport::pair();
        let client = PeerBuilder::new(client_transport, implementation())
            .default_timeout(Duration::from_millis(30))
            .build();
        client.connect().await.unwrap();

        let err = client
            .request::<Value>("ping", None, Some(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::Timeout));
    }

    #[tokio::test]
    async fn outbound_cancel_invokes_error_callback_once() {
        let (client_transport, _server_transport) = LoopbackTransport::pair();
        let client = PeerBuilder::new(client_transport, implementation()).build();
        client.connect().await.unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let id = client
            .send_request_with_callbacks(
                "slow",
                None,
                None,
                Box::new(|_| panic!("success should not fire")),
                Box::new(move |_| {
                    fired2.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        client.cancel(id, "no longer needed").await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_cancels_pending() {
        let (client_transport, _server_transport) = LoopbackTransport::pair();
        let client = PeerBuilder::new(client_transport, implementation()).build();
        client.connect().await.unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let _id = client
            .send_request_with_callbacks(
                "slow",
                None,
                None,
                Box::new(|_| panic!("success should not fire")),
                Box::new(move |_| {
                    fired2.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        client.close().await.unwrap();
        client.close().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(client.pending_request_count(), 0);
    }

    struct RecordingNotificationHandler {
        received: Arc<Mutex<Vec<(String, Option<Value>)>>>,
    }

    impl NotificationHandler for RecordingNotificationHandler {
        fn handle(&self, method: &str, params: Option<Value>) {
            self.received.lock().push((method.to_string(), params));
        }
    }

    #[tokio::test]
    async fn subscribe_then_notify_resource_updated_delivers_exactly_one_notification() {
        let (client_transport, server_transport) = LoopbackTransport::pair();

        let received: Arc<Mutex<Vec<(String, Option<Value>)>>> = Arc::new(Mutex::new(Vec::new()));
        let client = PeerBuilder::new(client_transport, implementation())
            .notification_handler(Arc::new(RecordingNotificationHandler {
                received: received.clone(),
            }))
            .build();
        let server = PeerBuilder::new(server_transport, implementation())
            .request_handler(Arc::new(EchoHandler))
            .build();

        client.connect().await.unwrap();
        server.connect().await.unwrap();

        let resources = mcpeer_server::ResourceRegistry::new();
        resources.subscribe("config://app", "client-session");

        server.notify_resource_updated(&resources, "config://app").await;

        for _ in 0..50 {
            if !received.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let events = received.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "notifications/resources/updated");
        assert_eq!(events[0].1.as_ref().unwrap()["uri"], "config://app");
    }
}
