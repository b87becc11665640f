/// A cursor over one line of inline markdown.
///
/// Markup delimiters are all ASCII, so matching works on bytes; text is
/// consumed a whole `char` at a time so the cursor never stops inside a
/// multi-byte sequence. `base` is the column of `s` within its line.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// The text being parsed.
    pub s: &'a str,
    /// Column of `s` within its line (added to `i` for reported positions).
    pub base: usize,
    /// Current byte index into `s`.
    pub i: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at the start of `s`, which begins at column `base`.
    pub fn new(s: &'a str, base: usize) -> Self {
        Self { s, base, i: 0 }
    }

    /// Column of the cursor within the original line.
    pub fn pos(&self) -> usize {
        self.base + self.i
    }

    /// Returns true once everything has been consumed.
    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    /// Peeks at the current byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.s.as_bytes().get(self.i).copied()
    }

    /// Peeks `ahead` bytes past the current one.
    pub fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.s.as_bytes().get(self.i + ahead).copied()
    }

    /// Checks if the remaining input starts with the given byte pattern.
    pub fn starts_with(&self, pat: &[u8]) -> bool {
        self.s.as_bytes()[self.i.min(self.s.len())..].starts_with(pat)
    }

    /// Advances by one byte, returning the consumed byte. Only for ASCII
    /// delimiters; text goes through [`Cursor::bump_char`].
    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.i += 1;
        Some(b)
    }

    /// Advances by `n` bytes. Not bounds checked; callers skip over
    /// delimiters they have already matched.
    pub fn bump_n(&mut self, n: usize) {
        self.i += n;
    }

    /// Consumes one full character.
    pub fn bump_char(&mut self) -> Option<char> {
        let ch = self.s.get(self.i..)?.chars().next()?;
        self.i += ch.len_utf8();
        Some(ch)
    }

    /// Length of the run of `b` starting at the cursor.
    pub fn run_len(&self, b: u8) -> usize {
        self.s.as_bytes()[self.i.min(self.s.len())..]
            .iter()
            .take_while(|&&c| c == b)
            .count()
    }

    /// The unconsumed remainder of `s`.
    pub fn rest(&self) -> &'a str {
        self.s.get(self.i..).unwrap_or("")
    }
}
