//! Second pass: statements, multi-line blocks, and string literals.
//!
//! Input is the comment-free text produced from the first pass, where every
//! statement ends in `\n` regardless of the session delimiter mode.

use crate::lexer::cursor::Cursor;
use crate::lexer::directive::{opens_end_block, starts_with_end_word};
use crate::lexer::mode::{LexMode, ModeStack};
use crate::lexer::quote::{is_string_mode, scan_string_step, try_open_string};
use crate::lexer::token::{Token, TokenKind, TokenSink};

/// Result of the block pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockScan {
    /// Tokens covering the whole input.
    pub tokens: Vec<Token>,
    /// Unclosed block nesting at end of input.
    pub open_blocks: u32,
}

impl BlockScan {
    /// Returns `true` when any token belongs to a block construct.
    pub fn has_block(&self) -> bool {
        self.tokens.iter().any(|token| token.kind == TokenKind::BlockBody)
    }

    /// Returns the concatenated token text.
    pub fn text(&self) -> String {
        self.tokens.iter().map(|token| token.text.as_str()).collect()
    }
}

/// Scans comment-free, newline-delimited text.
pub fn scan_blocks(input: &str) -> BlockScan {
    BlockLexer::new(input).run()
}

struct BlockLexer<'a> {
    input: &'a str,
    cursor: Cursor,
    stack: ModeStack,
    sink: TokenSink,
}

impl<'a> BlockLexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: Cursor::new(),
            stack: ModeStack::new(),
            sink: TokenSink::new(),
        }
    }

    fn run(mut self) -> BlockScan {
        while !self.cursor.is_eof(self.input) {
            let start = self.cursor.offset();
            let kind = self.step();
            let end = self.cursor.offset();
            debug_assert!(end > start, "block pass must consume input");
            self.sink.push(kind, self.input, start, end);
        }

        BlockScan {
            open_blocks: self.stack.open_blocks(),
            tokens: self.sink.finish(),
        }
    }

    fn step(&mut self) -> TokenKind {
        match self.stack.top() {
            mode if is_string_mode(mode) => {
                if !scan_string_step(&mut self.cursor, self.input, &mut self.stack) {
                    return self.step();
                }
                if self.stack.in_block() {
                    TokenKind::BlockBody
                } else {
                    TokenKind::StringLiteral
                }
            }
            LexMode::BlockBody(_) => self.step_brace_block(),
            LexMode::EndBlock => self.step_end_block(),
            _ => self.step_root(),
        }
    }

    fn current_line(&self) -> &'a str {
        let rest = self.cursor.rest(self.input);
        rest.split('\n').next().unwrap_or("")
    }

    fn step_root(&mut self) -> TokenKind {
        if self.cursor.at_line_start() && opens_end_block(self.current_line()) {
            self.stack.push(LexMode::EndBlock);
            self.cursor.advance_to_line_end(self.input);
            return TokenKind::BlockBody;
        }
        if let Some(mode) = try_open_string(&mut self.cursor, self.input) {
            self.stack.push(mode);
            return TokenKind::StringLiteral;
        }
        match self.cursor.advance(self.input) {
            Some('{') => {
                self.stack.push(LexMode::BlockBody(1));
                self.sink.retag_line_tail(TokenKind::BlockBody);
                TokenKind::BlockBody
            }
            Some('\n') => TokenKind::NewlineDelimiter,
            _ => TokenKind::PlainText,
        }
    }

    fn step_brace_block(&mut self) -> TokenKind {
        if let Some(mode) = try_open_string(&mut self.cursor, self.input) {
            self.stack.push(mode);
            return TokenKind::BlockBody;
        }
        match self.cursor.advance(self.input) {
            Some('{') => self.stack.push(LexMode::BlockBody(1)),
            Some('}') => self.stack.pop(),
            _ => {}
        }
        TokenKind::BlockBody
    }

    fn step_end_block(&mut self) -> TokenKind {
        if self.cursor.at_line_start() && starts_with_end_word(self.current_line()) {
            self.cursor.advance_to_line_end(self.input);
            self.stack.pop();
            return TokenKind::BlockBody;
        }
        if let Some(mode) = try_open_string(&mut self.cursor, self.input) {
            self.stack.push(mode);
            return TokenKind::BlockBody;
        }
        self.cursor.advance(self.input);
        TokenKind::BlockBody
    }
}
