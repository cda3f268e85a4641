use crate::object::Span;

/// Byte cursor shared by the object parser and the xref/objstm readers.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    pub bytes: &'a [u8],
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos.checked_add(n)?).copied()
    }

    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn span_since(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    /// Skips whitespace and `%` comments.
    pub fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(is_whitespace) {
                self.pos += 1;
            }
            if self.peek() != Some(b'%') {
                return;
            }
            while let Some(b) = self.bump() {
                if b == b'\n' || b == b'\r' {
                    break;
                }
            }
        }
    }

    pub fn starts_with(&self, kw: &[u8]) -> bool {
        self.bytes.get(self.pos..).is_some_and(|rest| rest.starts_with(kw))
    }

    pub fn eat(&mut self, kw: &[u8]) -> bool {
        if self.starts_with(kw) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    /// Like [`Cursor::eat`] but refuses a match that runs into a regular
    /// character, so `R` does not match the start of `RG`.
    pub fn eat_keyword(&mut self, kw: &[u8]) -> bool {
        if !self.starts_with(kw) {
            return false;
        }
        let boundary = self.bytes.get(self.pos + kw.len()).copied();
        if boundary.is_some_and(is_regular) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    /// Reads an unsigned decimal integer, leaving the cursor untouched on failure.
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            match value.checked_mul(10).and_then(|v| v.checked_add(u64::from(b - b'0'))) {
                Some(v) => value = v,
                None => {
                    self.pos = start;
                    return None;
                }
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        Some(value)
    }
}

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\x00' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

pub fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn trivia_skips_comments_and_whitespace() {
        let mut cur = Cursor::new(b"  % comment\r\n %x\n obj", 0);
        cur.skip_trivia();
        assert!(cur.eat(b"obj"));
        assert!(cur.eof());
    }

    #[test]
    fn keyword_requires_boundary() {
        let mut cur = Cursor::new(b"RG", 0);
        assert!(!cur.eat_keyword(b"R"));
        let mut cur = Cursor::new(b"R>>", 0);
        assert!(cur.eat_keyword(b"R"));
    }

    #[test]
    fn read_unsigned_rejects_overflow() {
        let mut cur = Cursor::new(b"99999999999999999999999", 0);
        assert_eq!(cur.read_unsigned(), None);
        let mut cur = Cursor::new(b"42 0", 0);
        assert_eq!(cur.read_unsigned(), Some(42));
        assert_eq!(cur.pos, 2);
    }
}
