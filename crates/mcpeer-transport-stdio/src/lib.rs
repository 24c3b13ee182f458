//! Subprocess spawn, newline-delimited or Content-Length-framed JSON,
//! background reader (C5).

mod config;
mod framing;
mod transport;

pub use config::StdioTransportConfig;
pub use framing::{frame, FrameAccumulator, Framing};
pub use transport::StdioTransport;
