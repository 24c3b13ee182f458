//! Subprocess and inherited-stdio transport (C5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use mcpeer_transport::{
    validate_message_size, ErrorCallback, MessageCallback, Transport, TransportError,
    TransportKind, TransportResult,
};

use crate::config::StdioTransportConfig;
use crate::framing::{frame, FrameAccumulator};

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

enum Source {
    /// Attach to the current process's own stdin/stdout.
    Inherited,
    /// Spawn a child and own its lifetime. The `Command` is consumed on
    /// the first `connect()`.
    Spawn(SyncMutex<Option<Command>>),
}

/// The state a spawned reader task needs to outlive the `connect()` call
/// that starts it. Held behind an `Arc` so `StdioTransport` itself can
/// still be used through `&self`, matching the `Transport` trait.
struct Inner {
    config: StdioTransportConfig,
    source: Source,
    connected: AtomicBool,
    writer: AsyncMutex<Option<BoxedWrite>>,
    reader_task: SyncMutex<Option<JoinHandle<()>>>,
    child: SyncMutex<Option<Child>>,
    message_cb: SyncMutex<Option<Arc<MessageCallback>>>,
    error_cb: SyncMutex<Option<Arc<ErrorCallback>>>,
}

/// Stdio transport: either the current process's inherited stdio, or a
/// spawned child's piped stdio. Framing on read is auto-detected per
/// connection; framing on write follows [`StdioTransportConfig`].
pub struct StdioTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("connected", &self.inner.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Attaches to the current process's own stdin/stdout.
    pub fn inherited(config: StdioTransportConfig) -> Self {
        Self::new(Source::Inherited, config)
    }

    /// Spawns `command` with piped stdin/stdout and owns its lifetime.
    /// `command`'s `stdin`/`stdout` are overwritten with pipes.
    pub fn spawn(mut command: Command, config: StdioTransportConfig) -> Self {
        command
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped());
        Self::new(Source::Spawn(SyncMutex::new(Some(command))), config)
    }

    fn new(source: Source, config: StdioTransportConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                source,
                connected: AtomicBool::new(false),
                writer: AsyncMutex::new(None),
                reader_task: SyncMutex::new(None),
                child: SyncMutex::new(None),
                message_cb: SyncMutex::new(None),
                error_cb: SyncMutex::new(None),
            }),
        }
    }
}

fn emit_error(error_cb: &Option<Arc<ErrorCallback>>, err: TransportError) {
    if let Some(cb) = error_cb {
        cb(err);
    }
}

fn spawn_reader(inner: Arc<Inner>, mut reader: BoxedRead) {
    let chunk_size = inner.config.read_chunk_size;
    let handle = tokio::spawn(async move {
        let mut accumulator = FrameAccumulator::new();
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("stdio transport: reader reached EOF");
                    inner.connected.store(false, Ordering::SeqCst);
                    let cb = inner.error_cb.lock().clone();
                    emit_error(&cb, TransportError::ConnectionLost("stdio EOF".to_string()));
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "stdio transport: read failed");
                    inner.connected.store(false, Ordering::SeqCst);
                    let cb = inner.error_cb.lock().clone();
                    emit_error(&cb, TransportError::Io(e.to_string()));
                    break;
                }
            };

            for message in accumulator.feed(&buf[..n]) {
                if let Err(error) = validate_message_size(message.len(), &inner.config.limits) {
                    warn!(%error, bytes = message.len(), "stdio transport: dropping oversized inbound message");
                    let cb = inner.error_cb.lock().clone();
                    emit_error(&cb, error);
                    continue;
                }
                trace!(bytes = message.len(), "stdio transport: complete message");
                if let Some(cb) = inner.message_cb.lock().clone() {
                    cb(message);
                }
            }
        }
    });
    *inner.reader_task.lock() = Some(handle);
}

#[async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    async fn connect(&self) -> TransportResult<()> {
        let (reader, writer): (BoxedRead, BoxedWrite) = match &self.inner.source {
            Source::Inherited => (
                Box::new(BufReader::new(tokio::io::stdin())),
                Box::new(tokio::io::stdout()),
            ),
            Source::Spawn(command_slot) => {
                let mut command = command_slot
                    .lock()
                    .take()
                    .ok_or_else(|| TransportError::ConnectionFailed("already spawned".into()))?;
                let mut child = command
                    .spawn()
                    .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| TransportError::ConnectionFailed("no child stdout".into()))?;
                let stdin = child
                    .stdin
                    .take()
                    .ok_or_else(|| TransportError::ConnectionFailed("no child stdin".into()))?;
                *self.inner.child.lock() = Some(child);
                (Box::new(BufReader::new(stdout)), Box::new(stdin))
            }
        };

        *self.inner.writer.lock().await = Some(writer);
        self.inner.connected.store(true, Ordering::SeqCst);
        spawn_reader(self.inner.clone(), reader);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);

        // Dropping the writer closes the write end, which is what
        // convinces a well-behaved child to exit on its own.
        *self.inner.writer.lock().await = None;

        if let Some(handle) = self.inner.reader_task.lock().take() {
            let _ = handle.await;
        }

        if let Some(mut child) = self.inner.child.lock().take() {
            let _ = child.wait().await;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: Vec<u8>) -> TransportResult<()> {
        validate_message_size(message.len(), &self.inner.config.limits)?;
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        let framed = frame(self.inner.config.write_framing, &message);
        writer
            .write_all(&framed)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.inner.message_cb.lock() = Some(Arc::new(callback));
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.inner.error_cb.lock() = Some(Arc::new(callback));
    }
}
