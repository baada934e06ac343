//! Character cursor with look-behind bookkeeping.

use crate::lexer::span::ByteOffset;

/// Class of the character consumed immediately before the cursor.
///
/// The scanners use this instead of regex look-behind: rules such as
/// "preceded by whitespace or line start" read it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrevClass {
    /// Nothing consumed yet, or the previous character was `\n`.
    LineStart,
    /// Horizontal whitespace.
    Whitespace,
    /// Any other character.
    Other(char),
}

impl PrevClass {
    fn of(ch: char) -> Self {
        if ch == '\n' {
            Self::LineStart
        } else if ch.is_whitespace() {
            Self::Whitespace
        } else {
            Self::Other(ch)
        }
    }
}

/// Position cursor over UTF-8 input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    offset: ByteOffset,
    prev: PrevClass,
    /// Only whitespace consumed since the last line start.
    line_blank: bool,
    /// Last non-whitespace character consumed, across lines.
    last_significant: Option<char>,
}

impl Cursor {
    /// Creates a cursor at byte offset `0`.
    pub(crate) fn new() -> Self {
        Self {
            offset: ByteOffset::new(0),
            prev: PrevClass::LineStart,
            line_blank: true,
            last_significant: None,
        }
    }

    /// Returns the current byte offset.
    pub(crate) fn offset(&self) -> ByteOffset {
        self.offset
    }

    /// Returns `true` if the cursor is at or beyond input end.
    pub(crate) fn is_eof(&self, input: &str) -> bool {
        self.offset.as_usize() >= input.len()
    }

    /// Returns the unconsumed tail of the input.
    pub(crate) fn rest<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.offset.as_usize()..).unwrap_or("")
    }

    /// Returns the character at cursor position.
    pub(crate) fn peek(&self, input: &str) -> Option<char> {
        self.rest(input).chars().next()
    }

    /// Returns the character `n` characters past the cursor.
    pub(crate) fn peek_nth(&self, input: &str, n: usize) -> Option<char> {
        self.rest(input).chars().nth(n)
    }

    /// Returns `true` when the tail starts with `pattern`.
    pub(crate) fn starts_with(&self, input: &str, pattern: &str) -> bool {
        self.rest(input).starts_with(pattern)
    }

    /// Class of the previously consumed character.
    pub(crate) fn prev(&self) -> PrevClass {
        self.prev
    }

    /// Returns `true` at input start or right after a `\n`.
    pub(crate) fn at_line_start(&self) -> bool {
        self.prev == PrevClass::LineStart
    }

    /// Returns `true` at line start or right after any whitespace.
    pub(crate) fn after_whitespace_or_line_start(&self) -> bool {
        matches!(self.prev, PrevClass::LineStart | PrevClass::Whitespace)
    }

    /// Returns `true` when the current line so far is non-empty whitespace.
    pub(crate) fn indented_blank_line(&self) -> bool {
        self.line_blank && self.prev == PrevClass::Whitespace
    }

    /// Returns `true` when whitespace separates the cursor from the last
    /// non-whitespace character, and that character is `ch`.
    pub(crate) fn spaced_after(&self, ch: char) -> bool {
        matches!(self.prev, PrevClass::Whitespace | PrevClass::LineStart)
            && self.last_significant == Some(ch)
    }

    /// Consumes one character and returns it.
    pub(crate) fn advance(&mut self, input: &str) -> Option<char> {
        let ch = self.peek(input)?;
        self.offset = ByteOffset::from_usize(self.offset.as_usize() + ch.len_utf8());
        self.prev = PrevClass::of(ch);
        if ch == '\n' {
            self.line_blank = true;
        } else if !ch.is_whitespace() {
            self.line_blank = false;
            self.last_significant = Some(ch);
        }
        Some(ch)
    }

    /// Consumes `count` characters, stopping early at end of input.
    pub(crate) fn advance_chars(&mut self, count: usize, input: &str) {
        for _ in 0..count {
            if self.advance(input).is_none() {
                break;
            }
        }
    }

    /// Consumes characters up to (not including) the next `\n`.
    pub(crate) fn advance_to_line_end(&mut self, input: &str) {
        while let Some(ch) = self.peek(input) {
            if ch == '\n' {
                break;
            }
            self.advance(input);
        }
    }
}
