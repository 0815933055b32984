//! Incremental record parser
//!
//! Turns a growing byte stream into [`Record`]s while the stream is still open.
//! Chunk boundaries carry no meaning: a line may span several chunks and one
//! chunk may finish several lines. Only newline-terminated lines are parsed
//! before the end of the stream; the trailing fragment is held back and parsed
//! once by [`RecordParser::finish`].
//!
//! ```text
//! Idle ──feed──▶ Accumulating ──finish──▶ Drained ──close──▶ Closed
//!                  │    ▲
//!                  └feed┘
//! ```

mod decode;
mod dialect;

pub use decode::Utf8Decoder;
pub use dialect::{Dialect, Record};

/// Lifecycle of a [`RecordParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No chunk received yet
    Idle,
    /// Chunks arriving, records emitted as lines complete
    Accumulating,
    /// End of stream seen and the trailing fragment flushed
    Drained,
    /// Buffers released
    Closed,
}

/// Incremental line-to-record parser for one request session.
///
/// Without a dialect the parser only accumulates decoded text; this is how
/// generated expressions are streamed.
#[derive(Debug)]
pub struct RecordParser {
    dialect: Option<Dialect>,
    decoder: Utf8Decoder,
    decoded: String,
    /// Byte offset in `decoded` where the pending fragment starts
    pending_start: usize,
    lines_completed: usize,
    records_emitted: usize,
    replacements: usize,
    state: ParserState,
}

impl RecordParser {
    pub fn new(dialect: Option<Dialect>) -> Self {
        Self {
            dialect,
            decoder: Utf8Decoder::new(),
            decoded: String::new(),
            pending_start: 0,
            lines_completed: 0,
            records_emitted: 0,
            replacements: 0,
            state: ParserState::Idle,
        }
    }

    /// Parse a whole chunk sequence in one go.
    pub fn parse_all<I, B>(dialect: Dialect, chunks: I) -> Vec<Record>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut parser = Self::new(Some(dialect));
        let mut records = Vec::new();
        for chunk in chunks {
            records.extend(parser.feed(chunk.as_ref()));
        }
        records.extend(parser.finish());
        records
    }

    /// Consume one chunk and return the records completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Record> {
        match self.state {
            ParserState::Drained | ParserState::Closed => {
                tracing::warn!(
                    state = ?self.state,
                    bytes = chunk.len(),
                    "Ignoring chunk fed to a finished parser"
                );
                return Vec::new();
            }
            ParserState::Idle => self.state = ParserState::Accumulating,
            ParserState::Accumulating => {}
        }

        let scan_from = self.decoded.len();
        let replaced = self.decoder.decode(chunk, &mut self.decoded);
        self.note_replacements(replaced);

        self.complete_lines(scan_from)
    }

    /// Mark the end of the stream and flush the pending fragment.
    ///
    /// Returns the last record if the fragment is a well-formed line. Calling
    /// this again returns `None`.
    pub fn finish(&mut self) -> Option<Record> {
        if matches!(self.state, ParserState::Drained | ParserState::Closed) {
            return None;
        }

        let replaced = self.decoder.flush(&mut self.decoded);
        self.note_replacements(replaced);
        self.state = ParserState::Drained;

        let fragment = &self.decoded[self.pending_start..];
        if fragment.is_empty() {
            return None;
        }
        let record = self
            .dialect?
            .parse_line(fragment, self.lines_completed + 1)?;
        self.records_emitted += 1;
        Some(record)
    }

    /// Release buffers. The parser accepts nothing afterwards.
    pub fn close(&mut self) {
        self.decoded = String::new();
        self.decoder = Utf8Decoder::new();
        self.pending_start = 0;
        self.state = ParserState::Closed;
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// All text decoded so far.
    pub fn decoded_text(&self) -> &str {
        &self.decoded
    }

    /// Text after the last newline, not yet known to be a complete line.
    pub fn pending_fragment(&self) -> &str {
        &self.decoded[self.pending_start..]
    }

    pub fn lines_completed(&self) -> usize {
        self.lines_completed
    }

    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }

    /// Replacement characters substituted for undecodable bytes.
    pub fn replacements(&self) -> usize {
        self.replacements
    }

    fn complete_lines(&mut self, scan_from: usize) -> Vec<Record> {
        let mut records = Vec::new();
        // The pending fragment never holds a newline, so only new text is scanned.
        let mut cursor = scan_from.max(self.pending_start);

        while let Some(offset) = self.decoded[cursor..].find('\n') {
            let end = cursor + offset;
            self.lines_completed += 1;
            if let Some(dialect) = self.dialect {
                let line = &self.decoded[self.pending_start..end];
                if let Some(record) = dialect.parse_line(line, self.lines_completed) {
                    records.push(record);
                }
            }
            self.pending_start = end + 1;
            cursor = self.pending_start;
        }

        self.records_emitted += records.len();
        records
    }

    fn note_replacements(&mut self, replaced: usize) {
        if replaced > 0 {
            self.replacements += replaced;
            tracing::warn!(
                replaced,
                total = self.replacements,
                "Replaced undecodable bytes in stream chunk"
            );
        }
    }
}
