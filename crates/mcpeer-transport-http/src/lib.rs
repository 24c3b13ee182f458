//! Streamable HTTP/SSE transport: sessions, SSE framing, RFC 6570 URI
//! templates (C6, C7).

mod config;
mod session;
mod sse;
mod transport;
mod uri_template;

pub use config::HttpTransportConfig;
pub use session::{Session, SessionId, SessionTable, SseSender};
pub use sse::{format_event, format_keepalive, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
pub use transport::{HttpTransport, SessionLookupError, SessionMessageCallback, SessionSendError};
pub use uri_template::{TemplateError, UriTemplate};
