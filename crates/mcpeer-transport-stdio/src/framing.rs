//! Newline-delimited and Content-Length (LSP-style) framing.
//!
//! The transport auto-detects the incoming framing by inspecting the
//! first non-empty line of the stream: a line starting with
//! `Content-Length:` selects header framing for the remainder of the
//! connection, anything else selects newline-delimited JSON. Outbound
//! framing is chosen by configuration, since a well-behaved host tells
//! its child which mode it expects rather than leaving it to be guessed.

use serde::{Deserialize, Serialize};

/// Which framing mode a side of the connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One complete JSON message per line, no embedded newlines.
    #[default]
    NewlineDelimited,
    /// `Content-Length: <n>\r\n\r\n<n bytes of payload>`.
    ContentLength,
}

/// Incrementally accumulates bytes read from the child/pipe and yields
/// complete message payloads as they become available, auto-detecting
/// framing from the first non-empty line.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    detected: Option<Framing>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The framing mode detected from the stream so far, if any bytes
    /// have been seen.
    pub fn detected_framing(&self) -> Option<Framing> {
        self.detected
    }

    /// Feeds newly read bytes in and drains every complete message now
    /// available. Partial trailing data is kept for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut messages = Vec::new();

        loop {
            if self.detected.is_none() {
                if let Some(framing) = detect_framing(&self.buf) {
                    self.detected = Some(framing);
                } else {
                    break;
                }
            }

            match self.detected {
                Some(Framing::NewlineDelimited) => match take_line(&mut self.buf) {
                    Some(line) if !line.is_empty() => messages.push(line),
                    Some(_) => continue, // skip blank lines between messages
                    None => break,
                },
                Some(Framing::ContentLength) => match take_content_length_message(&mut self.buf) {
                    Some(payload) => messages.push(payload),
                    None => break,
                },
                None => unreachable!("framing always detected before this match"),
            }
        }

        messages
    }
}

/// Inspects the first non-empty line to decide framing. Returns `None`
/// until at least one full line (or the Content-Length header line) has
/// arrived.
fn detect_framing(buf: &[u8]) -> Option<Framing> {
    let newline_pos = buf.iter().position(|&b| b == b'\n')?;
    let first_line = &buf[..newline_pos];
    if first_line
        .get(..15)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"Content-Length:"))
    {
        Some(Framing::ContentLength)
    } else {
        Some(Framing::NewlineDelimited)
    }
}

fn take_line(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop(); // trailing \n
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Parses and removes one `Content-Length: N\r\n\r\n<N bytes>` frame from
/// the front of `buf`, if a complete one is present.
fn take_content_length_message(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let header_end = find_subslice(buf, b"\r\n\r\n")?;
    let header_text = std::str::from_utf8(&buf[..header_end]).ok()?;

    let mut content_length: Option<usize> = None;
    for line in header_text.split("\r\n") {
        if let Some(value) = line
            .split_once(':')
            .filter(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
            .map(|(_, v)| v.trim())
        {
            content_length = value.parse().ok();
        }
    }
    let content_length = content_length?;

    let body_start = header_end + 4;
    let body_end = body_start.checked_add(content_length)?;
    if buf.len() < body_end {
        return None; // payload not fully arrived yet
    }

    let payload = buf[body_start..body_end].to_vec();
    buf.drain(..body_end);
    Some(payload)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Frames `payload` for the wire according to `framing`.
pub fn frame(framing: Framing, payload: &[u8]) -> Vec<u8> {
    match framing {
        Framing::NewlineDelimited => {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.extend_from_slice(payload);
            out.push(b'\n');
            out
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            let mut out = Vec::with_capacity(header.len() + payload.len());
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(payload);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_and_frames_newline_delimited() {
        let mut acc = FrameAccumulator::new();
        let msgs = acc.feed(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(acc.detected_framing(), Some(Framing::NewlineDelimited));
        assert_eq!(msgs, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
    }

    #[test]
    fn accumulates_partial_newline_delimited_reads() {
        let mut acc = FrameAccumulator::new();
        assert!(acc.feed(b"{\"a\":").is_empty());
        let msgs = acc.feed(b"1}\n");
        assert_eq!(msgs, vec![b"{\"a\":1}".to_vec()]);
    }

    #[test]
    fn detects_and_frames_content_length() {
        let mut acc = FrameAccumulator::new();
        let payload = b"{\"a\":1}";
        let framed = frame(Framing::ContentLength, payload);
        let msgs = acc.feed(&framed);
        assert_eq!(acc.detected_framing(), Some(Framing::ContentLength));
        assert_eq!(msgs, vec![payload.to_vec()]);
    }

    #[test]
    fn content_length_waits_for_full_payload() {
        let mut acc = FrameAccumulator::new();
        let header = b"Content-Length: 7\r\n\r\n";
        assert!(acc.feed(header).is_empty());
        assert!(acc.feed(b"{\"a\":").is_empty());
        let msgs = acc.feed(b"1}");
        assert_eq!(msgs, vec![b"{\"a\":1}".to_vec()]);
    }

    #[test]
    fn content_length_handles_multiple_frames_in_one_feed() {
        let mut acc = FrameAccumulator::new();
        let mut bytes = frame(Framing::ContentLength, b"{\"a\":1}");
        bytes.extend(frame(Framing::ContentLength, b"{\"b\":2}"));
        let msgs = acc.feed(&bytes);
        assert_eq!(msgs, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
    }
}
