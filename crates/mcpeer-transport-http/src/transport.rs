//! Streamable HTTP/SSE transport adapter (C6).
//!
//! Unlike stdio, HTTP has no single persistent byte stream: a server
//! embedder fields concurrent `POST`/`GET`/`DELETE` calls across many
//! sessions, each identified by an `Mcp-Session-Id` header. `HttpTransport`
//! is therefore framework-agnostic — it does not open a listening socket
//! itself. An embedder (axum, actix, whatever) calls [`HttpTransport::handle_post`],
//! [`HttpTransport::handle_get`], and [`HttpTransport::terminate_session`]
//! from its route handlers and wires the `Vec<u8>` bodies and
//! `mpsc::UnboundedReceiver<String>` SSE streams to its own request/response
//! types.
//!
//! The [`mcpeer_transport::Transport`] trait impl below covers the
//! cross-transport generic contract: `send` fans a message out to every
//! live session (used for un-targeted server-initiated notifications,
//! e.g. `notifications/tools/list_changed`); anything targeted at one
//! session goes through [`HttpTransport::send_to_session`] instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use mcpeer_transport::{
    validate_message_size, ErrorCallback, MessageCallback, Transport, TransportError,
    TransportKind, TransportResult,
};

use crate::config::HttpTransportConfig;
use crate::session::{Session, SessionId, SessionTable};

/// Invoked per inbound message with the session it arrived on. Preferred
/// over the generic, session-blind [`MessageCallback`] for HTTP, which
/// multiplexes many sessions over one transport instance.
pub type SessionMessageCallback = Box<dyn Fn(SessionId, Vec<u8>) + Send + Sync>;

/// A session id was supplied (or looked up) that the transport doesn't
/// recognize — the client likely needs to re-initialize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown session: {0}")]
pub struct SessionLookupError(pub SessionId);

/// Either the session wasn't found, or the payload exceeded the
/// transport's configured [`mcpeer_transport::LimitsConfig`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionSendError {
    #[error(transparent)]
    UnknownSession(#[from] SessionLookupError),
    #[error("message of {size} bytes exceeds the {max}-byte limit")]
    MessageTooLarge { size: usize, max: usize },
}

struct Inner {
    config: HttpTransportConfig,
    sessions: SessionTable,
    connected: AtomicBool,
    message_cb: SyncMutex<Option<Arc<MessageCallback>>>,
    session_message_cb: SyncMutex<Option<Arc<SessionMessageCallback>>>,
    error_cb: SyncMutex<Option<Arc<ErrorCallback>>>,
}

/// The streamable HTTP/SSE transport: a session table plus the inbound
/// callback plumbing an embedder's route handlers feed into.
pub struct HttpTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("connected", &self.inner.connected.load(Ordering::SeqCst))
            .field("sessions", &self.inner.sessions.len())
            .finish()
    }
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let sessions = SessionTable::new(config.sse_buffer_cap, config.session_idle_timeout);
        Self {
            inner: Arc::new(Inner {
                config,
                sessions,
                connected: AtomicBool::new(false),
                message_cb: SyncMutex::new(None),
                session_message_cb: SyncMutex::new(None),
                error_cb: SyncMutex::new(None),
            }),
        }
    }

    /// Registers the session-aware inbound callback. Takes priority over
    /// the generic [`MessageCallback`] set via [`Transport::set_message_callback`]
    /// when both are present.
    pub fn set_session_message_callback(&self, callback: SessionMessageCallback) {
        *self.inner.session_message_cb.lock() = Some(Arc::new(callback));
    }

    /// Handles an inbound `POST`: attaches to `session_id` if given (else
    /// mints a fresh session, the `initialize` path), and hands `body` to
    /// whichever inbound callback is registered. Returns the session so
    /// the embedder can echo its id back in the `Mcp-Session-Id` response
    /// header.
    pub fn handle_post(
        &self,
        session_id: Option<&SessionId>,
        body: Vec<u8>,
    ) -> Result<Arc<Session>, SessionSendError> {
        if let Err((size, max)) = self.inner.config.limits.check_size(body.len()) {
            let cb = self.inner.error_cb.lock().clone();
            if let Some(cb) = cb {
                cb(TransportError::Framing(format!(
                    "message of {size} bytes exceeds the {max}-byte limit"
                )));
            }
            return Err(SessionSendError::MessageTooLarge { size, max });
        }

        let session = match session_id {
            Some(id) => self
                .inner
                .sessions
                .get(id)
                .ok_or_else(|| SessionLookupError(id.clone()))?,
            None => self.inner.sessions.create(),
        };

        trace!(session = %session.id(), bytes = body.len(), "http transport: inbound POST");

        if let Some(cb) = self.inner.session_message_cb.lock().clone() {
            cb(session.id().clone(), body);
        } else if let Some(cb) = self.inner.message_cb.lock().clone() {
            cb(body);
        }

        Ok(session)
    }

    /// Handles an inbound `GET`: attaches a fresh SSE writer to
    /// `session_id`, replaying any buffered events after `last_event_id`,
    /// and returns the receiving end for the embedder to stream out as
    /// the response body.
    pub fn handle_get(
        &self,
        session_id: &SessionId,
        last_event_id: Option<u64>,
    ) -> Result<mpsc::UnboundedReceiver<String>, SessionLookupError> {
        let session = self
            .inner
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionLookupError(session_id.clone()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        session.attach_writer(tx, last_event_id);
        Ok(rx)
    }

    /// Handles an inbound `DELETE`: tears the session down immediately.
    /// The caller (the peer engine) is responsible for dropping any
    /// subscriptions keyed on this session's identity.
    pub fn terminate_session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        debug!(session = %session_id, "http transport: session terminated");
        self.inner.sessions.terminate(session_id)
    }

    /// Sends `payload` (serialized JSON) to one specific session, buffering
    /// it and forwarding to an attached SSE writer if present. Never blocks
    /// on the network.
    pub fn send_to_session(
        &self,
        session_id: &SessionId,
        payload: String,
    ) -> Result<u64, SessionSendError> {
        if let Err((size, max)) = self.inner.config.limits.check_size(payload.len()) {
            return Err(SessionSendError::MessageTooLarge { size, max });
        }
        let session = self
            .inner
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionLookupError(session_id.clone()))?;
        Ok(session.send(payload))
    }

    /// Sweeps and removes every session idle past this transport's
    /// configured timeout, returning how many were purged.
    pub fn purge_idle_sessions(&self) -> usize {
        self.inner.sessions.purge_idle().len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.inner.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn connect(&self) -> TransportResult<()> {
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.sessions.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: Vec<u8>) -> TransportResult<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        validate_message_size(message.len(), &self.inner.config.limits)?;
        let payload = String::from_utf8(message)
            .map_err(|e| TransportError::Framing(format!("non-utf8 payload: {e}")))?;
        for id in self.session_ids() {
            let _ = self.send_to_session(&id, payload.clone());
        }
        Ok(())
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.inner.message_cb.lock() = Some(Arc::new(callback));
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.inner.error_cb.lock() = Some(Arc::new(callback));
    }
}

impl HttpTransport {
    fn session_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn post_without_session_id_mints_a_new_session() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        transport.connect().await.unwrap();
        let received: Arc<StdMutex<Vec<(SessionId, Vec<u8>)>>> =
            Arc::new(StdMutex::new(Vec::new()));
        let r2 = received.clone();
        transport.set_session_message_callback(Box::new(move |id, body| {
            r2.lock().unwrap().push((id, body));
        }));

        let session = transport.handle_post(None, b"{\"a\":1}".to_vec()).unwrap();
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(received.lock().unwrap()[0].0, *session.id());
    }

    #[tokio::test]
    async fn post_with_unknown_session_id_errors() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        let bogus = SessionId::generate();
        let result = transport.handle_post(Some(&bogus), b"{}".to_vec());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_streams_replayed_and_live_events() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        let session = transport.handle_post(None, b"{\"init\":true}".to_vec()).unwrap();
        let id = session.id().clone();

        transport
            .send_to_session(&id, "{\"n\":1}".to_string())
            .unwrap();

        let mut rx = transport.handle_get(&id, None).unwrap();
        transport
            .send_to_session(&id, "{\"n\":2}".to_string())
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(first.contains("\"n\":1"));
        let second = rx.recv().await.unwrap();
        assert!(second.contains("\"n\":2"));
    }

    #[tokio::test]
    async fn terminate_session_removes_it() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        let session = transport.handle_post(None, b"{}".to_vec()).unwrap();
        let id = session.id().clone();
        assert!(transport.terminate_session(&id).is_some());
        assert!(transport.handle_post(Some(&id), b"{}".to_vec()).is_err());
    }

    #[tokio::test]
    async fn send_without_connect_errors() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        let result = transport.send(b"{}".to_vec()).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn purge_idle_sessions_reports_count() {
        let mut config = HttpTransportConfig::default();
        config.session_idle_timeout = Duration::from_millis(10);
        let transport = HttpTransport::new(config);
        transport.handle_post(None, b"{}".to_vec()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(transport.purge_idle_sessions(), 1);
        assert_eq!(transport.session_count(), 0);
    }

    #[tokio::test]
    async fn post_over_the_size_limit_is_rejected_and_reported() {
        let mut config = HttpTransportConfig::default();
        config.limits.max_message_size = Some(4);
        let transport = HttpTransport::new(config);

        let error_count = Arc::new(AtomicUsize::new(0));
        let ec = error_count.clone();
        transport.set_error_callback(Box::new(move |e| {
            assert!(matches!(e, TransportError::Framing(_)));
            ec.fetch_add(1, Ordering::SeqCst);
        }));

        let result = transport.handle_post(None, b"too long".to_vec());
        assert!(matches!(
            result,
            Err(SessionSendError::MessageTooLarge { size: 8, max: 4 })
        ));
        assert_eq!(error_count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.session_count(), 0);
    }

    #[tokio::test]
    async fn send_to_session_over_the_size_limit_is_rejected() {
        let mut config = HttpTransportConfig::default();
        config.limits.max_message_size = Some(4);
        let transport = HttpTransport::new(config);
        let session = transport.handle_post(None, b"{}".to_vec()).unwrap();

        let result = transport.send_to_session(session.id(), "too long".to_string());
        assert!(matches!(
            result,
            Err(SessionSendError::MessageTooLarge { size: 8, max: 4 })
        ));
    }

    #[tokio::test]
    async fn broadcast_send_over_the_size_limit_errors_with_framing() {
        let mut config = HttpTransportConfig::default();
        config.limits.max_message_size = Some(4);
        let transport = HttpTransport::new(config);
        transport.connect().await.unwrap();

        let result = transport.send(b"too long".to_vec()).await;
        assert!(matches!(result, Err(TransportError::Framing(_))));
    }

    #[tokio::test]
    async fn error_callback_is_not_invoked_on_clean_disconnect() {
        let transport = HttpTransport::new(HttpTransportConfig::default());
        let error_count = Arc::new(AtomicUsize::new(0));
        let ec = error_count.clone();
        transport.set_error_callback(Box::new(move |_| {
            ec.fetch_add(1, Ordering::SeqCst);
        }));
        transport.connect().await.unwrap();
        transport.handle_post(None, b"{}".to_vec()).unwrap();
        transport.disconnect().await.unwrap();
        assert_eq!(error_count.load(Ordering::SeqCst), 0);
        assert_eq!(transport.session_count(), 0);
    }
}
