//! Per-request handler context (C11).
//!
//! Passed by mutable reference to every tool/resource/prompt handler. It is
//! the handler's only window into the engine: progress reporting, streaming
//! partial results, cooperative cancellation, and scoped key/value storage.
//! It holds no owning reference to the transport or the peer — only a
//! [`ProgressSink`] the engine supplies, so a context can never outlive the
//! session in a way that keeps the transport alive past its natural
//! lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mcpeer_wire::RequestId;
use serde_json::Value;

use crate::timeout::TimeoutManager;

/// How a [`RequestContext`] delivers progress and streaming frames back to
/// the caller. The engine supplies an implementation bound to the session's
/// transport; stdio and HTTP render the same calls differently (newline
/// JSON vs. SSE data frames), which is exactly why this is a trait and not
/// baked into the context itself.
pub trait ProgressSink: Send + Sync {
    /// Sends a `notifications/progress` carrying `progress_token`.
    fn send_progress(&self, progress_token: &Value, progress: u8, message: Option<&str>);

    /// Sends a partial streaming result for a request still in flight.
    fn send_stream_result(&self, progress_token: &Value, partial: Value);
}

/// A no-op sink used when a handler is invoked outside of a live session
/// (e.g. in tests) and progress/streaming calls should be silently dropped.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn send_progress(&self, _progress_token: &Value, _progress: u8, _message: Option<&str>) {}
    fn send_stream_result(&self, _progress_token: &Value, _partial: Value) {}
}

/// Per-request state visible to a tool/resource/prompt handler.
///
/// `progress_token` comes from `_meta.progressToken` on the incoming
/// request's params, per spec; its absence makes [`Self::report_progress`]
/// and [`Self::send_stream_result`] silent no-ops rather than errors, since
/// a caller who didn't ask for progress shouldn't be forced to handle it.
pub struct RequestContext {
    request_id: RequestId,
    progress_token: Option<Value>,
    sink: Arc<dyn ProgressSink>,
    timeouts: Option<Arc<TimeoutManager>>,
    cancelled: Arc<AtomicBool>,
    properties: Mutex<HashMap<String, Value>>,
}

impl RequestContext {
    /// Builds a context for `request_id`, optionally carrying a progress
    /// token extracted from the request's `_meta`.
    pub fn new(
        request_id: RequestId,
        progress_token: Option<Value>,
        sink: Arc<dyn ProgressSink>,
        timeouts: Option<Arc<TimeoutManager>>,
    ) -> Self {
        Self {
            request_id,
            progress_token,
            sink,
            timeouts,
            cancelled: Arc::new(AtomicBool::new(false)),
            properties: Mutex::new(HashMap::new()),
        }
    }

    /// A context with no transport-facing sink, for unit tests and
    /// synchronous handler invocations that don't need live progress.
    pub fn detached(request_id: RequestId) -> Self {
        Self::new(request_id, None, Arc::new(NullProgressSink), None)
    }

    /// The id of the request this context was created for.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// A handle the engine uses to flip the cancellation flag from the
    /// dispatch loop when an inbound `notifications/cancelled` arrives for
    /// this request.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// `true` once the engine has observed a matching cancellation
    /// notification. Handlers are expected to check this cooperatively at
    /// natural yield points; the engine never forcibly aborts a handler.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reports progress (0–100) with an optional human-readable message.
    ///
    /// No-op if the caller supplied no progress token. Also resets this
    /// request's deadline via the timeout manager, so a handler that keeps
    /// reporting measured progress is never killed mid-flight.
    pub fn report_progress(&self, progress: u8, message: Option<&str>) {
        let Some(token) = &self.progress_token else {
            return;
        };
        self.sink.send_progress(token, progress, message);
        if let Some(timeouts) = &self.timeouts {
            timeouts.reset_to_original(&self.request_id);
        }
    }

    /// Emits a partial result ahead of the handler's final return value.
    ///
    /// No-op if the caller supplied no progress token — streaming is opt-in
    /// by the presence of that token, same as progress reporting.
    pub fn send_stream_result(&self, partial: Value) {
        let Some(token) = &self.progress_token else {
            return;
        };
        self.sink.send_stream_result(token, partial);
    }

    /// Stores a handler-local value under `key`, visible to later calls on
    /// the same context within this request's lifetime.
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.properties
            .lock()
            .expect("context properties poisoned")
            .insert(key.into(), value);
    }

    /// Reads a previously stored handler-local value.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties
            .lock()
            .expect("context properties poisoned")
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct RecordingSink {
        progress_calls: AtomicUsize,
        stream_calls: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn send_progress(&self, _token: &Value, _progress: u8, _message: Option<&str>) {
            self.progress_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn send_stream_result(&self, _token: &Value, _partial: Value) {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn progress_is_noop_without_a_token() {
        let sink = Arc::new(RecordingSink {
            progress_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        });
        let ctx = RequestContext::new(RequestId::Number(1), None, sink.clone(), None);
        ctx.report_progress(50, Some("halfway"));
        ctx.send_stream_result(serde_json::json!({"partial": true}));
        assert_eq!(sink.progress_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn progress_reaches_sink_when_token_present() {
        let sink = Arc::new(RecordingSink {
            progress_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        });
        let ctx = RequestContext::new(
            RequestId::Number(1),
            Some(serde_json::json!("tok-1")),
            sink.clone(),
            None,
        );
        ctx.report_progress(10, None);
        ctx.send_stream_result(serde_json::json!({"chunk": 1}));
        assert_eq!(sink.progress_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.stream_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_flag_is_observable_through_the_handle() {
        let ctx = RequestContext::detached(RequestId::Number(1));
        let handle = ctx.cancellation_handle();
        assert!(!ctx.is_cancelled());
        handle.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn properties_round_trip() {
        let ctx = RequestContext::detached(RequestId::Number(1));
        assert!(ctx.get_property("k").is_none());
        ctx.set_property("k", serde_json::json!(42));
        assert_eq!(ctx.get_property("k"), Some(serde_json::json!(42)));
    }
}
