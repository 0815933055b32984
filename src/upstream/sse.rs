//! Server-sent events framing used by OpenAI-compatible streaming endpoints.
//!
//! Frames are separated by a blank line. Bytes are buffered until a whole
//! frame has arrived, so a frame split across network reads is decoded once.

/// The standard SSE termination marker used by OpenAI-compatible APIs.
pub const SSE_DONE: &str = "[DONE]";

/// One complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn is_done(&self) -> bool {
        self.data.trim() == SSE_DONE
    }
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the connection.
    pub fn push(&mut self, bytes: &[u8]) {
        // CRLF line endings are folded to LF.
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Take the next complete frame, skipping frames that carry no data.
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&raw[..end]) {
                return Some(frame);
            }
        }
        None
    }

    /// Decode whatever is left once the connection has closed.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if let Some(frame) = self.next_frame() {
            return Some(frame);
        }
        let raw = std::mem::take(&mut self.buffer);
        parse_frame(&raw)
    }
}

fn parse_frame(raw: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(raw);
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data_lines.push(value),
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}
