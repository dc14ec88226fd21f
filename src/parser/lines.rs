//! Incremental line extraction over a byte stream.
//!
//! Lines are cut on `\n` at the byte level. A newline byte never occurs
//! inside a multi-byte UTF-8 sequence, so a character split across two read
//! chunks is always reassembled before its line is decoded.

/// Length of the offending line in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTooLong(pub usize);

#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    cursor: usize,
    max_line_length: usize,
}

impl LineSplitter {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            pending: Vec::new(),
            cursor: 0,
            max_line_length,
        }
    }

    /// Append a freshly read chunk, dropping bytes already handed out.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.cursor > 0 {
            self.pending.drain(..self.cursor);
            self.cursor = 0;
        }
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line, or `None` until more input arrives.
    pub fn next_line(&mut self) -> Result<Option<String>, LineTooLong> {
        let rest = &self.pending[self.cursor..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos > self.max_line_length {
                    return Err(LineTooLong(pos));
                }
                let line = decode(&rest[..pos]);
                self.cursor += pos + 1;
                Ok(Some(line))
            }
            None if rest.len() > self.max_line_length => Err(LineTooLong(rest.len())),
            None => Ok(None),
        }
    }

    /// The trailing line without a terminator, once the stream is exhausted.
    pub fn finish(&mut self) -> Result<Option<String>, LineTooLong> {
        let rest = &self.pending[self.cursor..];
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() > self.max_line_length {
            return Err(LineTooLong(rest.len()));
        }
        let line = decode(rest);
        self.pending.clear();
        self.cursor = 0;
        Ok(Some(line))
    }

    /// Bytes buffered but not yet returned as a line.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.cursor
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(splitter: &mut LineSplitter) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = splitter.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_lines_across_chunks() {
        let mut splitter = LineSplitter::new(100);
        splitter.push(b"a,b\r\nc,");
        assert_eq!(drain(&mut splitter), vec!["a,b"]);
        assert_eq!(splitter.pending_len(), 2);

        splitter.push(b"d\ne");
        assert_eq!(drain(&mut splitter), vec!["c,d"]);
        assert_eq!(splitter.finish().unwrap(), Some("e".to_string()));
        assert_eq!(splitter.finish().unwrap(), None);
    }

    #[test]
    fn test_multibyte_character_split_between_chunks() {
        let text = "Zürich,1\n".as_bytes();
        let split_at = 2; // inside the two-byte 'ü'
        let mut splitter = LineSplitter::new(100);
        splitter.push(&text[..split_at]);
        assert_eq!(drain(&mut splitter), Vec::<String>::new());
        splitter.push(&text[split_at..]);
        assert_eq!(drain(&mut splitter), vec!["Zürich,1"]);
    }

    #[test]
    fn test_line_too_long_without_terminator() {
        let mut splitter = LineSplitter::new(4);
        splitter.push(b"abcdefgh");
        assert_eq!(splitter.next_line(), Err(LineTooLong(8)));
    }

    #[test]
    fn test_line_too_long_with_terminator() {
        let mut splitter = LineSplitter::new(4);
        splitter.push(b"ok\ntoolong\n");
        assert_eq!(splitter.next_line(), Ok(Some("ok".to_string())));
        assert_eq!(splitter.next_line(), Err(LineTooLong(7)));
    }
}
