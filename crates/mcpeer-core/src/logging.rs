//! Process-wide structured logger (C13).
//!
//! A small config type describing *where* logs go, an `init()` that wires
//! up a `tracing` subscriber accordingly, and a guard that must be held for
//! the lifetime of the process when logs are buffered through a file
//! sink. The one invariant that matters more than any other here: stdio
//! transports carry the JSON-RPC protocol on stdout, so library
//! diagnostics must never be written there. `LogOutput` simply has no
//! stdout variant.

use std::io;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Where log records are written. There is deliberately no `Stdout`
/// variant — stdio transports own stdout for the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Logging is disabled.
    #[default]
    None,
    /// Write to stderr only.
    Stderr,
    /// Write to a rotating file only.
    FileOnly,
    /// Write to both stderr and a rotating file.
    Both,
}

/// How often the file sink rotates, when [`LogOutput::FileOnly`] or
/// [`LogOutput::Both`] is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

/// Logger configuration. `Default` matches spec's stance that an
/// uninitialized logger must not be required for correct protocol
/// operation: the default is `LogOutput::None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level emitted (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Where logs are written.
    pub output: LogOutput,
    /// Directory for file output; required when `output` writes to file.
    pub directory: Option<String>,
    /// File name prefix for rotated log files.
    pub file_prefix: String,
    pub rotation: LogRotation,
    /// Whether request/response payload bodies are logged at all.
    pub log_payloads: bool,
    /// Payloads longer than this many bytes are truncated before logging.
    pub max_payload_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::None,
            directory: None,
            file_prefix: "mcpeer".to_string(),
            rotation: LogRotation::Never,
            log_payloads: false,
            max_payload_size: 2048,
        }
    }
}

impl LoggingConfig {
    /// Stderr only, level `info` — safe default for a server run manually.
    pub fn stderr() -> Self {
        Self {
            output: LogOutput::Stderr,
            ..Self::default()
        }
    }

    /// File-only logging under `dir`, for stdio servers where stderr may
    /// also be captured by a host that doesn't expect MCP diagnostics.
    pub fn file_only(dir: impl Into<String>) -> Self {
        Self {
            output: LogOutput::FileOnly,
            directory: Some(dir.into()),
            rotation: LogRotation::Hourly,
            ..Self::default()
        }
    }

    /// Enables or adjusts payload logging; `max_size` bounds how much of
    /// a JSON body is logged before truncation.
    pub fn with_payload_logging(mut self, enabled: bool, max_size: usize) -> Self {
        self.log_payloads = enabled;
        self.max_payload_size = max_size;
        self
    }

    /// Initializes the global `tracing` subscriber from this config.
    ///
    /// Returns a [`LoggingHandle`] for runtime `set_level` calls, plus
    /// `Some(LoggingGuard)` when file output is involved — that guard must
    /// be held for the process lifetime to flush buffered writes. Neither
    /// a subscriber nor a reload handle is installed for
    /// [`LogOutput::None`]: an uninitialized logger must not be required
    /// for correct protocol operation.
    pub fn init(&self) -> io::Result<(LoggingHandle, Option<LoggingGuard>)> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let (filter, reload_handle) = reload::Layer::new(filter);

        match self.output {
            LogOutput::None => Ok((LoggingHandle { inner: None }, None)),
            LogOutput::Stderr => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(io::stderr))
                    .try_init()
                    .map_err(io::Error::other)?;
                Ok((LoggingHandle { inner: Some(reload_handle) }, None))
            }
            LogOutput::FileOnly => {
                let dir = self.require_directory()?;
                let appender = self.rolling_appender(dir);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(writer))
                    .try_init()
                    .map_err(io::Error::other)?;
                Ok((
                    LoggingHandle { inner: Some(reload_handle) },
                    Some(LoggingGuard {
                        _file_guard: guard,
                        _stderr_guard: None,
                    }),
                ))
            }
            LogOutput::Both => {
                let dir = self.require_directory()?;
                let appender = self.rolling_appender(dir);
                let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
                let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(io::stderr());
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(file_writer.and(stderr_writer)))
                    .try_init()
                    .map_err(io::Error::other)?;
                Ok((
                    LoggingHandle { inner: Some(reload_handle) },
                    Some(LoggingGuard {
                        _file_guard: file_guard,
                        _stderr_guard: Some(stderr_guard),
                    }),
                ))
            }
        }
    }

    fn require_directory(&self) -> io::Result<&str> {
        self.directory.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "file-based LogOutput requires `directory` to be set",
            )
        })
    }

    fn rolling_appender(&self, dir: &str) -> tracing_appender::rolling::RollingFileAppender {
        match self.rotation {
            LogRotation::Minutely => tracing_appender::rolling::minutely(dir, &self.file_prefix),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, &self.file_prefix),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, &self.file_prefix),
            LogRotation::Never => tracing_appender::rolling::never(dir, &self.file_prefix),
        }
    }

    /// Truncates `payload` to `max_payload_size` bytes for logging,
    /// respecting `log_payloads`; returns `None` entirely when payload
    /// logging is disabled.
    pub fn truncate_payload(&self, payload: &str) -> Option<String> {
        if !self.log_payloads {
            return None;
        }
        if payload.len() <= self.max_payload_size {
            Some(payload.to_string())
        } else {
            let mut end = self.max_payload_size;
            while end > 0 && !payload.is_char_boundary(end) {
                end -= 1;
            }
            Some(format!("{}... ({} bytes truncated)", &payload[..end], payload.len() - end))
        }
    }
}

/// Must be held for the process lifetime when [`LoggingConfig::init`]
/// returns one; dropping it early can lose buffered log lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: Option<WorkerGuard>,
}

/// Runtime handle for adjusting the log level after [`LoggingConfig::init`]
/// has installed a subscriber, per spec's `set_level` operation. A handle
/// obtained from [`LogOutput::None`] is a no-op: there's no subscriber to
/// reconfigure.
#[derive(Clone)]
pub struct LoggingHandle {
    inner: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LoggingHandle {
    /// Replaces the active filter with one built from `level`, honoring
    /// `RUST_LOG` if set, same as the filter `init()` originally built.
    pub fn set_level(&self, level: &str) -> io::Result<()> {
        let Some(handle) = &self.inner else {
            return Ok(());
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        handle.reload(filter).map_err(io::Error::other)
    }
}

/// An RAII span: emits an opening record on construction, a closing
/// record carrying elapsed microseconds on drop. An explicit type rather
/// than `#[instrument]` so call sites that need to attach ad hoc context
/// (not known until inside the span) have somewhere to put it.
pub struct Span {
    name: &'static str,
    start: Instant,
    level: Level,
}

impl Span {
    /// Opens a span named `name` at `tracing::Level::INFO`.
    pub fn new(name: &'static str) -> Self {
        Self::at_level(name, Level::INFO)
    }

    /// Opens a span at an explicit level.
    pub fn at_level(name: &'static str, level: Level) -> Self {
        match level {
            Level::TRACE => tracing::trace!(span = name, "start"),
            Level::DEBUG => tracing::debug!(span = name, "start"),
            Level::INFO => tracing::info!(span = name, "start"),
            Level::WARN => tracing::warn!(span = name, "start"),
            Level::ERROR => tracing::error!(span = name, "start"),
        }
        Self {
            name,
            start: Instant::now(),
            level,
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let elapsed_us = self.start.elapsed().as_micros();
        match self.level {
            Level::TRACE => tracing::trace!(span = self.name, elapsed_us, "end"),
            Level::DEBUG => tracing::debug!(span = self.name, elapsed_us, "end"),
            Level::INFO => tracing::info!(span = self.name, elapsed_us, "end"),
            Level::WARN => tracing::warn!(span = self.name, elapsed_us, "end"),
            Level::ERROR => tracing::error!(span = self.name, elapsed_us, "end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_is_none() {
        assert_eq!(LoggingConfig::default().output, LogOutput::None);
    }

    #[test]
    fn file_only_requires_directory_at_init_time() {
        let config = LoggingConfig {
            output: LogOutput::FileOnly,
            directory: None,
            ..LoggingConfig::default()
        };
        assert!(config.init().is_err());
    }

    #[test]
    fn payload_truncation_respects_the_flag() {
        let config = LoggingConfig::default().with_payload_logging(true, 8);
        assert_eq!(config.truncate_payload("12345678901234"), Some("12345678... (6 bytes truncated)".to_string()));

        let config = LoggingConfig::default();
        assert_eq!(config.truncate_payload("anything"), None);
    }

    #[test]
    fn span_does_not_panic_without_a_subscriber() {
        let _span = Span::new("test-span");
    }

    #[test]
    fn set_level_on_a_none_output_handle_is_a_harmless_no_op() {
        let handle = LoggingHandle { inner: None };
        assert!(handle.set_level("debug").is_ok());
    }
}
