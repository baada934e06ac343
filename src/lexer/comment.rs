//! First pass: comment recognition and delimiter-mode resolution.
//!
//! The pass never drops text. Every input byte lands in exactly one token,
//! so joining the token texts reconstructs the input. Callers strip the
//! comment tokens themselves.

use crate::lexer::cursor::Cursor;
use crate::lexer::directive::{
    DelimitDirective, match_delimit_directive, opens_mata_line, starts_with_end_word,
};
use crate::lexer::mode::{LexMode, ModeStack};
use crate::lexer::quote::{is_string_mode, scan_string_step, try_open_string};
use crate::lexer::span::ByteOffset;
use crate::lexer::token::{CommentEndState, DelimiterMode, Token, TokenKind, TokenSink};

/// Result of the comment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentScan {
    /// Tokens covering the whole input.
    pub tokens: Vec<Token>,
    /// Open comment construct at end of input, if any.
    pub end_state: CommentEndState,
    /// Delimiter mode in effect after the input.
    pub final_mode: DelimiterMode,
    /// End of the `#delimit` directive line that entered the final explicit
    /// mode, or `None` when no directive in this input did.
    pub explicit_since: Option<ByteOffset>,
}

impl CommentScan {
    /// Returns the input text with all comment tokens removed.
    pub fn stripped_text(&self) -> String {
        self.tokens
            .iter()
            .filter(|token| !token.kind.is_comment())
            .map(|token| token.text.as_str())
            .collect()
    }
}

/// Scans `input` starting in `initial` delimiter mode.
///
/// `input` must already be newline-normalized (`\n` only).
pub fn scan_comments(input: &str, initial: DelimiterMode) -> CommentScan {
    CommentLexer::new(input, initial).run()
}

/// Comment-pass scanner state.
struct CommentLexer<'a> {
    input: &'a str,
    cursor: Cursor,
    stack: ModeStack,
    delimiter: DelimiterMode,
    explicit_since: Option<ByteOffset>,
    in_mata: bool,
    sink: TokenSink,
}

impl<'a> CommentLexer<'a> {
    fn new(input: &'a str, delimiter: DelimiterMode) -> Self {
        Self {
            input,
            cursor: Cursor::new(),
            stack: ModeStack::new(),
            delimiter,
            explicit_since: None,
            in_mata: false,
            sink: TokenSink::new(),
        }
    }

    fn run(mut self) -> CommentScan {
        while !self.cursor.is_eof(self.input) {
            let start = self.cursor.offset();
            let kind = self.step();
            let end = self.cursor.offset();
            debug_assert!(end > start, "comment pass must consume input");
            self.sink.push(kind, self.input, start, end);
        }

        let end_state = self.end_state();
        let tokens = self.sink.finish();
        CommentScan {
            tokens,
            end_state,
            final_mode: self.delimiter,
            explicit_since: self.explicit_since,
        }
    }

    fn end_state(&self) -> CommentEndState {
        let mut stack = self.stack.clone();
        loop {
            match stack.top() {
                LexMode::CommentBlock(depth) => {
                    return CommentEndState::UnterminatedBlockComment { depth };
                }
                LexMode::CommentContinuation => return CommentEndState::PendingContinuation,
                LexMode::Root => break,
                _ => stack.pop(),
            }
        }
        // A continuation consumes its own `\n`; ending on one means the
        // next physical line is still owed.
        if self.sink.last_kind() == Some(TokenKind::CommentContinuation) {
            return CommentEndState::PendingContinuation;
        }
        CommentEndState::Clean
    }

    /// Consumes at least one character and returns the kind to tag it with.
    fn step(&mut self) -> TokenKind {
        match self.stack.top() {
            LexMode::CommentBlock(_) => self.step_block_comment(),
            LexMode::CommentStar => self.step_star_comment(),
            LexMode::CommentLine => self.step_line_comment(),
            LexMode::CommentContinuation => self.step_continuation(),
            mode if is_string_mode(mode) => {
                if !scan_string_step(&mut self.cursor, self.input, &mut self.stack) {
                    return self.step();
                }
                self.text_kind(TokenKind::StringLiteral)
            }
            _ => match self.delimiter {
                DelimiterMode::Newline => self.step_newline_root(),
                DelimiterMode::Explicit(terminator) => self.step_explicit_root(terminator),
            },
        }
    }

    /// Kind for non-comment text in the current delimiter mode.
    fn text_kind(&self, newline_kind: TokenKind) -> TokenKind {
        if self.delimiter.is_explicit() {
            TokenKind::NamespaceBody
        } else {
            newline_kind
        }
    }

    fn step_newline_root(&mut self) -> TokenKind {
        if self.cursor.at_line_start() {
            self.track_mata_line();
            if let Some(DelimitDirective::Explicit) = self.directive_at_line_start() {
                self.cursor.advance_to_line_end(self.input);
                self.delimiter = DelimiterMode::SEMICOLON;
                self.explicit_since = Some(self.cursor.offset());
                return TokenKind::CommentLine;
            }
            if !self.in_mata && self.consume_star_opener() {
                self.stack.push(LexMode::CommentStar);
                return TokenKind::CommentLine;
            }
        }

        let double_slash_allowed = self.cursor.after_whitespace_or_line_start();
        if let Some(kind) = self.try_open_slash_comment(double_slash_allowed) {
            return kind;
        }
        if let Some(mode) = try_open_string(&mut self.cursor, self.input) {
            self.stack.push(mode);
            return TokenKind::StringLiteral;
        }
        self.cursor.advance(self.input);
        TokenKind::PlainText
    }

    fn step_explicit_root(&mut self, terminator: char) -> TokenKind {
        if self.cursor.at_line_start() {
            if let Some(DelimitDirective::Newline) = self.directive_at_line_start() {
                self.cursor.advance_to_line_end(self.input);
                self.delimiter = DelimiterMode::Newline;
                self.explicit_since = None;
                return TokenKind::CommentLine;
            }
            if self.consume_star_opener() {
                self.stack.push(LexMode::CommentStar);
                return TokenKind::CommentLine;
            }
        }

        let double_slash_allowed = self.cursor.starts_with(self.input, "//")
            && self.explicit_double_slash_allowed(terminator);
        if let Some(kind) = self.try_open_slash_comment(double_slash_allowed) {
            return kind;
        }
        if let Some(mode) = try_open_string(&mut self.cursor, self.input) {
            self.stack.push(mode);
            return TokenKind::NamespaceBody;
        }
        match self.cursor.advance(self.input) {
            Some(ch) if ch == terminator => TokenKind::SemicolonDelimiter,
            _ => TokenKind::NamespaceBody,
        }
    }

    /// Opens `///`, `//`, or `/*` comments at the cursor.
    ///
    /// `double_slash_allowed` gates the `//` form, whose left context rule
    /// differs between delimiter modes.
    fn try_open_slash_comment(&mut self, double_slash_allowed: bool) -> Option<TokenKind> {
        if self.cursor.starts_with(self.input, "///")
            && self.cursor.after_whitespace_or_line_start()
        {
            self.cursor.advance_chars(3, self.input);
            self.stack.push(LexMode::CommentContinuation);
            return Some(TokenKind::CommentContinuation);
        }
        if self.cursor.starts_with(self.input, "//") && double_slash_allowed {
            self.cursor.advance_chars(2, self.input);
            self.stack.push(LexMode::CommentLine);
            return Some(TokenKind::CommentLine);
        }
        if self.cursor.starts_with(self.input, "/*") {
            self.cursor.advance_chars(2, self.input);
            self.stack.push(LexMode::CommentBlock(1));
            return Some(TokenKind::CommentBlock);
        }
        None
    }

    /// `//` in explicit mode needs whitespace after the line start, or a
    /// terminator followed by whitespace, to its left.
    fn explicit_double_slash_allowed(&self, terminator: char) -> bool {
        self.cursor.indented_blank_line() || self.cursor.spaced_after(terminator)
    }

    /// Consumes `[ \t]*\*` at a line start.
    fn consume_star_opener(&mut self) -> bool {
        let rest = self.cursor.rest(self.input);
        let indent = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        if rest[indent..].starts_with('*') {
            self.cursor.advance_chars(indent + 1, self.input);
            return true;
        }
        false
    }

    fn directive_at_line_start(&self) -> Option<DelimitDirective> {
        let rest = self.cursor.rest(self.input);
        let line = rest.split('\n').next().unwrap_or("");
        match_delimit_directive(line)
    }

    fn track_mata_line(&mut self) {
        let rest = self.cursor.rest(self.input);
        let line = rest.split('\n').next().unwrap_or("");
        if self.in_mata {
            if starts_with_end_word(line) {
                self.in_mata = false;
            }
        } else if opens_mata_line(line) {
            self.in_mata = true;
        }
    }

    fn step_block_comment(&mut self) -> TokenKind {
        if self.cursor.starts_with(self.input, "/*") {
            self.cursor.advance_chars(2, self.input);
            self.stack.push(LexMode::CommentBlock(1));
        } else if self.cursor.starts_with(self.input, "*/*") {
            self.cursor.advance_chars(3, self.input);
        } else if self.cursor.starts_with(self.input, "*/") {
            self.cursor.advance_chars(2, self.input);
            if self.closing_star_follows() {
                self.cursor.advance_to_line_end(self.input);
            }
            self.stack.pop();
        } else {
            self.cursor.advance(self.input);
        }
        TokenKind::CommentBlock
    }

    /// Whitespace then a `*` not followed by `/` after a closing `*/`.
    fn closing_star_follows(&self) -> bool {
        let rest = self.cursor.rest(self.input);
        let body = rest.trim_start_matches(char::is_whitespace);
        body.len() < rest.len() && body.starts_with('*') && !body.starts_with("*/")
    }

    fn step_star_comment(&mut self) -> TokenKind {
        if let Some(terminator) = self.delimiter.terminator() {
            if self.cursor.peek(self.input) == Some(terminator) {
                self.stack.pop();
                return self.step();
            }
        }

        if self.cursor.starts_with(self.input, "///") {
            self.cursor.advance_to_line_end(self.input);
            self.cursor.advance(self.input);
            self.stack.replace(LexMode::CommentContinuation);
            return TokenKind::CommentLine;
        }
        if !self.delimiter.is_explicit()
            && self.cursor.starts_with(self.input, "//")
            && self.cursor.after_whitespace_or_line_start()
        {
            self.cursor.advance_chars(2, self.input);
            self.stack.replace(LexMode::CommentLine);
            return TokenKind::CommentLine;
        }
        if self.cursor.starts_with(self.input, "/*") {
            self.cursor.advance_chars(2, self.input);
            self.stack.push(LexMode::CommentBlock(1));
            return TokenKind::CommentBlock;
        }
        if !self.delimiter.is_explicit() && self.cursor.peek(self.input) == Some('\n') {
            self.stack.pop();
            return self.step();
        }
        self.cursor.advance(self.input);
        TokenKind::CommentLine
    }

    fn step_line_comment(&mut self) -> TokenKind {
        if self.cursor.peek(self.input) == Some('\n') {
            self.cursor.advance(self.input);
            self.stack.pop();
            return self.text_kind(TokenKind::PlainText);
        }
        self.cursor.advance(self.input);
        TokenKind::CommentLine
    }

    fn step_continuation(&mut self) -> TokenKind {
        match self.cursor.peek(self.input) {
            Some('\n') => {
                self.cursor.advance(self.input);
                self.stack.pop();
                TokenKind::CommentContinuation
            }
            Some('/') if self.cursor.peek_nth(self.input, 1) == Some('/') => {
                self.cursor.advance_to_line_end(self.input);
                self.stack.pop();
                TokenKind::CommentLine
            }
            _ => {
                self.cursor.advance(self.input);
                TokenKind::CommentContinuation
            }
        }
    }
}
