/// Streaming UTF-8 decoder.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the next
/// chunk completes it. Bytes that can never form valid UTF-8 are replaced with
/// U+FFFD, so decoding one chunk at a time yields the same text as decoding the
/// whole stream at once.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    partial: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` into `out`. Returns the number of replacement characters written.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) -> usize {
        if self.partial.is_empty() {
            self.decode_bytes(chunk, out)
        } else {
            let mut joined = std::mem::take(&mut self.partial);
            joined.extend_from_slice(chunk);
            self.decode_bytes(&joined, out)
        }
    }

    /// Flush a sequence left incomplete by the end of the stream.
    pub fn flush(&mut self, out: &mut String) -> usize {
        if self.partial.is_empty() {
            return 0;
        }
        self.partial.clear();
        out.push(char::REPLACEMENT_CHARACTER);
        1
    }

    /// Bytes held back waiting for the rest of a sequence.
    pub fn pending_bytes(&self) -> usize {
        self.partial.len()
    }

    fn decode_bytes(&mut self, bytes: &[u8], out: &mut String) -> usize {
        let mut rest = bytes;
        let mut replaced = 0;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    return replaced;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // The prefix up to `valid_up_to` is valid UTF-8, so this never replaces.
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            replaced += 1;
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.partial = rest[valid..].to_vec();
                            return replaced;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunks(chunks: &[&[u8]]) -> (String, usize) {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        let mut replaced = 0;
        for chunk in chunks {
            replaced += decoder.decode(chunk, &mut out);
        }
        replaced += decoder.flush(&mut out);
        (out, replaced)
    }

    #[test]
    fn test_ascii_passthrough() {
        let (out, replaced) = decode_chunks(&[b"0 | (0-59)", b" | minute\n"]);
        assert_eq!(out, "0 | (0-59) | minute\n");
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_split_multibyte_sequence_is_reassembled() {
        let text = "range – minute ✓";
        let bytes = text.as_bytes();
        // Split inside the three-byte en dash.
        let cut = text.find('–').unwrap() + 1;
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        assert_eq!(decoder.decode(&bytes[..cut], &mut out), 0);
        assert_eq!(decoder.pending_bytes(), 1);
        assert_eq!(decoder.decode(&bytes[cut..], &mut out), 0);
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(out, text);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let text = "día | (1–31) | día del mes 🗓\n";
        let chunks: Vec<&[u8]> = text.as_bytes().chunks(1).collect();
        let (out, replaced) = decode_chunks(&chunks);
        assert_eq!(out, text);
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let (out, replaced) = decode_chunks(&[b"ok \xFF\xFE done"]);
        assert_eq!(out, "ok \u{FFFD}\u{FFFD} done");
        assert_eq!(replaced, 2);
    }

    #[test]
    fn test_invalid_bytes_across_chunks_match_whole() {
        let whole = decode_chunks(&[b"a\xE2\x82b\xF0\x9F\x98"]);
        let split = decode_chunks(&[b"a\xE2", b"\x82b\xF0", b"\x9F", b"\x98"]);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_truncated_tail_flushed_as_replacement() {
        let (out, replaced) = decode_chunks(&[b"end \xE2\x82"]);
        assert_eq!(out, "end \u{FFFD}");
        assert_eq!(replaced, 1);
    }
}
