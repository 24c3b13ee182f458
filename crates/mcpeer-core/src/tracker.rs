//! Outbound request correlation.
//!
//! The tracker owns every `PendingRequest` between the moment a request is
//! sent and the moment it is completed, cancelled, or timed out. Callbacks
//! are stored by value (owned closures, not borrows) and are always
//! extracted from the pending table under lock, then invoked *after* the
//! lock is released — this is the one rule applied consistently by every
//! shared table in this crate, so a callback that re-enters the tracker
//! (e.g. sending a follow-up request from an error handler) never
//! deadlocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use mcpeer_wire::{JsonRpcError, RequestId};
use serde_json::Value;

use crate::error::PendingError;

/// A success callback, invoked at most once with the request's result.
pub type SuccessCallback = Box<dyn FnOnce(Value) + Send>;
/// An error callback, invoked at most once with the terminal failure.
pub type ErrorCallback = Box<dyn FnOnce(PendingError) + Send>;

/// A request awaiting its correlated response.
pub struct PendingRequest {
    pub id: RequestId,
    on_success: SuccessCallback,
    on_error: ErrorCallback,
    /// When this entry was registered, for observability.
    pub registered_at: Instant,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

/// Programming-error signal: attempted to register an id that is already
/// pending.
#[derive(Debug, Clone, thiserror::Error)]
#[error("request id {0} is already registered")]
pub struct DuplicateIdError(pub RequestId);

/// Issues library-generated request ids and correlates responses to the
/// callbacks registered when the request was sent.
#[derive(Debug)]
pub struct RequestTracker {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Creates an empty tracker; the first id issued is `1` (`0` is
    /// reserved).
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates the next monotonically increasing request id.
    ///
    /// Uses relaxed ordering: uniqueness of the returned value does not
    /// require establishing a happens-before relationship with other
    /// threads, only that `fetch_add` itself is atomic.
    pub fn next_id(&self) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        RequestId::Number(id)
    }

    /// Registers a pending request with its terminal callbacks.
    ///
    /// Fails only if `id` is already present, which indicates a
    /// programming error (e.g. reusing an id obtained from somewhere other
    /// than [`Self::next_id`]).
    pub fn register(
        &self,
        id: RequestId,
        on_success: SuccessCallback,
        on_error: ErrorCallback,
    ) -> Result<(), DuplicateIdError> {
        let mut table = self.pending.lock().expect("pending table poisoned");
        if table.contains_key(&id) {
            return Err(DuplicateIdError(id));
        }
        table.insert(
            id.clone(),
            PendingRequest {
                id,
                on_success,
                on_error,
                registered_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Completes a pending request successfully, invoking its success
    /// callback. Returns `false` if `id` was not pending (response for an
    /// unknown or already-completed request — the caller should drop it).
    pub fn complete(&self, id: &RequestId, result: Value) -> bool {
        let Some(entry) = self.take(id) else {
            return false;
        };
        (entry.on_success)(result);
        true
    }

    /// Completes a pending request with a JSON-RPC error, invoking its
    /// error callback. Returns `false` if `id` was not pending.
    pub fn complete_with_error(&self, id: &RequestId, error: JsonRpcError) -> bool {
        let Some(entry) = self.take(id) else {
            return false;
        };
        (entry.on_error)(PendingError::Protocol(error));
        true
    }

    /// Cancels a pending request, invoking its error callback with the
    /// given reason. No-op if `id` is not pending.
    pub fn cancel(&self, id: &RequestId, reason: PendingError) {
        if let Some(entry) = self.take(id) {
            (entry.on_error)(reason);
        }
    }

    /// Cancels every pending request, e.g. on transport failure or
    /// session shutdown.
    pub fn cancel_all(&self, reason: impl Fn() -> PendingError) {
        let entries: Vec<PendingRequest> = {
            let mut table = self.pending.lock().expect("pending table poisoned");
            table.drain().map(|(_, v)| v).collect()
        };
        for entry in entries {
            (entry.on_error)(reason());
        }
    }

    /// Removes and returns a pending entry without invoking its callbacks
    /// — used internally and by timeout integration, which wants to run
    /// its own bookkeeping before the callback fires.
    fn take(&self, id: &RequestId) -> Option<PendingRequest> {
        let mut table = self.pending.lock().expect("pending table poisoned");
        table.remove(id)
    }

    /// The number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending table poisoned").len()
    }
}
