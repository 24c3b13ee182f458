//! HTTP session table, event buffering, and idle expiry (C6).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::sse::format_event;

/// Idle interval after which a session without activity is purged.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default cap on buffered events retained per session for resumption.
pub const DEFAULT_SSE_BUFFER_CAP: usize = 256;

/// A session identifier: ≥128 bits of entropy, printable ASCII
/// (`0x21..=0x7E`), UUID-v4-shaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mints a fresh cryptographically random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a session id received over the wire (`Mcp-Session-Id`
    /// header), validating it is printable ASCII.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| (0x21..=0x7E).contains(&b)) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One buffered outbound event, addressable by its monotonic per-session
/// id for `Last-Event-ID` resumption.
#[derive(Debug, Clone)]
struct BufferedEvent {
    id: u64,
    payload: String,
}

/// The outbound channel to an attached SSE GET connection. Sending never
/// blocks on the network: it's an unbounded channel drained by whatever
/// HTTP framework adapter is servicing the GET request.
pub type SseSender = mpsc::UnboundedSender<String>;

/// A single MCP session: buffered outbound events plus whatever SSE
/// writer is currently attached (none, if the client hasn't issued a GET
/// or has disconnected).
pub struct Session {
    id: SessionId,
    created_at: Instant,
    last_activity: Mutex<Instant>,
    next_event_id: AtomicU64,
    buffer: Mutex<VecDeque<BufferedEvent>>,
    buffer_cap: usize,
    writer: Mutex<Option<SseSender>>,
}

impl Session {
    fn new(id: SessionId, buffer_cap: usize) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_activity: Mutex::new(now),
            next_event_id: AtomicU64::new(1),
            buffer: Mutex::new(VecDeque::new()),
            buffer_cap,
            writer: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// `true` if no activity has occurred for at least `idle_timeout`.
    pub fn is_idle(&self, idle_timeout: Duration) -> bool {
        self.last_activity.lock().elapsed() >= idle_timeout
    }

    /// Appends `payload` (already-serialized JSON) as a new event,
    /// assigning it the next monotonic event id, trimming the buffer to
    /// its cap, and writing it to the attached SSE writer if any.
    ///
    /// Never blocks on the network: this only appends to the in-memory
    /// buffer and does a non-blocking channel send.
    pub fn send(&self, payload: String) -> u64 {
        self.touch();
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);

        {
            let mut buffer = self.buffer.lock();
            buffer.push_back(BufferedEvent {
                id,
                payload: payload.clone(),
            });
            while buffer.len() > self.buffer_cap {
                buffer.pop_front();
            }
        }

        if let Some(writer) = self.writer.lock().as_ref() {
            let _ = writer.send(format_event(&payload, Some(id)));
        }

        id
    }

    /// Attaches an SSE writer for this session, replaying buffered
    /// events with id greater than `last_event_id` before returning —
    /// the caller is expected to hold the writer end open afterward for
    /// live events.
    pub fn attach_writer(&self, writer: SseSender, last_event_id: Option<u64>) {
        self.touch();
        let replay: Vec<BufferedEvent> = {
            let buffer = self.buffer.lock();
            buffer
                .iter()
                .filter(|e| last_event_id.is_none_or(|last| e.id > last))
                .cloned()
                .collect()
        };
        for event in replay {
            let _ = writer.send(format_event(&event.payload, Some(event.id)));
        }
        *self.writer.lock() = Some(writer);
    }

    /// Detaches the current SSE writer (e.g. on client disconnect).
    /// Future sends remain buffered until the next GET reattaches one.
    pub fn detach_writer(&self) {
        *self.writer.lock() = None;
    }

    pub fn has_writer(&self) -> bool {
        self.writer.lock().is_some()
    }
}

/// The table of live sessions for one HTTP transport instance.
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    buffer_cap: usize,
    idle_timeout: Duration,
}

impl SessionTable {
    pub fn new(buffer_cap: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            buffer_cap,
            idle_timeout,
        }
    }

    /// Mints and inserts a new session, typically on the first POST
    /// lacking an `Mcp-Session-Id` header.
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(SessionId::generate(), self.buffer_cap));
        self.sessions
            .write()
            .insert(session.id().clone(), session.clone());
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Removes a session immediately, e.g. on an explicit `DELETE` or a
    /// transport-level fault. Returns the removed session so the caller
    /// (the peer engine) can drop any subscriptions keyed on its
    /// identity.
    pub fn terminate(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    /// Removes and returns every session idle for at least this table's
    /// configured timeout.
    pub fn purge_idle(&self) -> Vec<Arc<Session>> {
        let idle_timeout = self.idle_timeout;
        let mut table = self.sessions.write();
        let expired_ids: Vec<SessionId> = table
            .iter()
            .filter(|(_, s)| s.is_idle(idle_timeout))
            .map(|(id, _)| id.clone())
            .collect();
        expired_ids
            .into_iter()
            .filter_map(|id| table.remove(&id))
            .collect()
    }

    /// A snapshot of every currently live session id, for un-targeted
    /// fan-out sends.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every session unconditionally, e.g. on transport teardown.
    pub fn clear(&self) {
        self.sessions.write().clear();
    }
}
