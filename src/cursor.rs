/// Positioned view over a source string with a single save slot.
///
/// Every speculative match in the parsers calls `save` before trying and
/// `restore` when the attempt fails; nothing else about the parse state is
/// touched on the failure path.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    source: &'a str,
    pos: usize,
    mark: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Cursor {
            source,
            pos: 0,
            mark: 0,
        }
    }

    /// Byte offset of the read position.
    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn save(&mut self) {
        self.mark = self.pos;
    }

    pub fn restore(&mut self) {
        self.pos = self.mark;
    }

    /// Move forward `len` bytes, clamped to the end of input and rounded up to
    /// the next char boundary. Returns the new remainder.
    pub fn advance(&mut self, len: usize) -> &'a str {
        let mut pos = (self.pos + len).min(self.source.len());
        while !self.source.is_char_boundary(pos) {
            pos += 1;
        }
        self.pos = pos;
        self.remaining()
    }

    pub fn advance_past(&mut self, consumed: &str) -> &'a str {
        self.advance(consumed.len())
    }

    pub fn skip_whitespace(&mut self) -> &'a str {
        let rest = self.remaining();
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;
        &rest[..skipped]
    }

    /// The last `n` chars before the read position (fewer near the start).
    pub fn lookbehind(&self, n: usize) -> &'a str {
        let before = &self.source[..self.pos];
        match before.char_indices().rev().nth(n.saturating_sub(1)) {
            Some((start, _)) if n > 0 => &before[start..],
            _ if n == 0 => "",
            _ => before,
        }
    }

    pub fn starts_with(&self, literal: &str) -> bool {
        self.remaining().starts_with(literal)
    }

    pub fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}
