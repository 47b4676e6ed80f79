use bytes::{Bytes, BytesMut};

/// Stateful splitter for newline-delimited JSON arriving in arbitrary chunks.
///
/// Lines are cut on the raw bytes. A `\n` byte never occurs inside a
/// multi-byte UTF-8 sequence, so a character split across two chunks stays in
/// the pending buffer until its remainder arrives and every returned line is
/// decoded exactly once.
pub struct NdjsonReassembler {
    /// Bytes received after the last newline
    pending: BytesMut,
}

impl Default for NdjsonReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl NdjsonReassembler {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
        }
    }

    /// Append a chunk and return every line it completed, in arrival order.
    ///
    /// Blank lines are dropped here and never reach the parser. The
    /// unterminated tail stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        // Only the freshly appended bytes can contain a new delimiter.
        let last_newline = match self.pending[scan_from..]
            .iter()
            .rposition(|byte| *byte == b'\n')
        {
            Some(offset) => scan_from + offset,
            None => return Vec::new(),
        };

        let complete = self.pending.split_to(last_newline + 1).freeze();

        let mut lines = Vec::new();
        let mut start = 0;
        for (idx, byte) in complete.iter().enumerate() {
            if *byte == b'\n' {
                let line = trim_carriage_return(complete.slice(start..idx));
                if !is_blank(&line) {
                    lines.push(line);
                }
                start = idx + 1;
            }
        }
        lines
    }

    /// Take whatever is left once the upstream has ended.
    ///
    /// Returns `None` for an empty or whitespace-only remainder so a stream
    /// ending exactly on a delimiter never produces an empty parse attempt.
    pub fn finish(&mut self) -> Option<Bytes> {
        let remainder = trim_carriage_return(self.pending.split().freeze());
        if is_blank(&remainder) {
            None
        } else {
            Some(remainder)
        }
    }

    /// Size of the buffered incomplete line (for debugging/logging)
    pub fn buffered_size(&self) -> usize {
        self.pending.len()
    }
}

fn trim_carriage_return(line: Bytes) -> Bytes {
    if line.ends_with(b"\r") {
        line.slice(..line.len() - 1)
    } else {
        line
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn as_strings(lines: Vec<Bytes>) -> Vec<String> {
        lines
            .into_iter()
            .map(|line| String::from_utf8(line.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_complete_lines_returned_immediately() {
        let mut reassembler = NdjsonReassembler::new();
        let lines = reassembler.push(b"{\"a\":1}\n{\"b\":2}\n");

        assert_eq!(as_strings(lines), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(reassembler.buffered_size(), 0);
    }

    #[test]
    fn test_partial_line_buffered_until_completed() {
        let mut reassembler = NdjsonReassembler::new();

        assert!(reassembler.push(b"{\"response\":\"imp").is_empty());
        assert_eq!(reassembler.buffered_size(), 16);

        let lines = reassembler.push(b"ort\"}\n{\"resp");
        assert_eq!(as_strings(lines), vec!["{\"response\":\"import\"}"]);
        assert_eq!(reassembler.buffered_size(), 6);
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let mut reassembler = NdjsonReassembler::new();
        let lines = reassembler.push(b"\n   \n{\"a\":1}\r\n\r\n");

        assert_eq!(as_strings(lines), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "{\"response\":\"caf\u{e9} \u{1f980}\"}\n";
        let bytes = text.as_bytes();
        // split inside the four byte crab
        let split = text.find('\u{1f980}').unwrap() + 2;

        let mut reassembler = NdjsonReassembler::new();
        assert!(reassembler.push(&bytes[..split]).is_empty());
        let lines = reassembler.push(&bytes[split..]);

        assert_eq!(
            as_strings(lines),
            vec!["{\"response\":\"caf\u{e9} \u{1f980}\"}"]
        );
    }

    #[test]
    fn test_finish_returns_trailing_record() {
        let mut reassembler = NdjsonReassembler::new();
        reassembler.push(b"{\"a\":1}\n{\"done\":true}");

        let tail = reassembler.finish().unwrap();
        assert_eq!(&tail[..], b"{\"done\":true}");
        assert_eq!(reassembler.buffered_size(), 0);
        assert!(reassembler.finish().is_none());
    }

    #[test]
    fn test_finish_on_delimiter_boundary_is_none() {
        let mut reassembler = NdjsonReassembler::new();
        reassembler.push(b"{\"a\":1}\n");
        assert!(reassembler.finish().is_none());

        reassembler.push(b"  \r");
        assert!(reassembler.finish().is_none());
    }
}
