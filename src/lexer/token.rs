//! Token, delimiter, and end-state contracts shared by both lexer passes.

use crate::lexer::span::{ByteOffset, Span};

/// Token categories produced by the two lexer passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Ordinary statement text.
    PlainText,
    /// `// ...`, `* ...`, or a delimiter directive line.
    CommentLine,
    /// `/* ... */`, including nested levels.
    CommentBlock,
    /// `/// ...` through the end of the physical line.
    CommentContinuation,
    /// Text inside a brace block or an `end`-terminated block.
    BlockBody,
    /// A string literal outside any block.
    StringLiteral,
    /// One explicit statement terminator.
    SemicolonDelimiter,
    /// A newline acting as statement terminator.
    NewlineDelimiter,
    /// Statement text while an explicit terminator is active.
    NamespaceBody,
}

impl TokenKind {
    /// Returns `true` for the comment categories.
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            Self::CommentLine | Self::CommentBlock | Self::CommentContinuation
        )
    }

    /// Returns `true` for statement terminator tokens.
    pub fn is_delimiter(self) -> bool {
        matches!(self, Self::SemicolonDelimiter | Self::NewlineDelimiter)
    }
}

/// A lexical token with raw text and source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token category.
    pub kind: TokenKind,
    /// Token text preserved as scanned.
    pub text: String,
    /// Byte-oriented source span.
    pub span: Span,
}

impl Token {
    /// Creates a token value.
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }
}

/// Statement delimiter mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DelimiterMode {
    /// Statements end at a newline.
    #[default]
    Newline,
    /// Statements end at the given character; newlines are whitespace.
    Explicit(char),
}

impl DelimiterMode {
    /// The `#delimit ;` mode.
    pub const SEMICOLON: Self = Self::Explicit(';');

    /// Returns the explicit terminator, if any.
    pub fn terminator(self) -> Option<char> {
        match self {
            Self::Newline => None,
            Self::Explicit(terminator) => Some(terminator),
        }
    }

    /// Returns `true` when an explicit terminator is active.
    pub fn is_explicit(self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

/// How the comment pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentEndState {
    /// No comment construct is left open.
    Clean,
    /// Input ended inside a block comment at the given depth.
    UnterminatedBlockComment {
        /// Nesting depth still open.
        depth: u32,
    },
    /// Input ended inside, or right after, a `///` continuation.
    PendingContinuation,
}

/// Reason why a buffer is not yet submittable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// A brace or `end`-terminated block is still open.
    UnclosedBlock,
    /// A block comment is still open.
    UnterminatedBlockComment,
    /// The last line ends with a `///` continuation.
    PendingContinuation,
    /// Explicit-terminator mode has text after the last terminator.
    MissingTerminator,
}

/// Coalescing token collector used by the scanners.
///
/// Adjacent spans of the same kind merge into one token; delimiter tokens
/// never merge so each terminator stays individually addressable.
#[derive(Debug, Default, Clone)]
pub(crate) struct TokenSink {
    tokens: Vec<Token>,
}

impl TokenSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends `input[start..end]` tagged as `kind`.
    pub(crate) fn push(
        &mut self,
        kind: TokenKind,
        input: &str,
        start: ByteOffset,
        end: ByteOffset,
    ) {
        if start >= end {
            return;
        }
        let text = &input[start.as_usize()..end.as_usize()];
        if !kind.is_delimiter() {
            if let Some(last) = self.tokens.last_mut() {
                if last.kind == kind && last.span.end == start {
                    last.text.push_str(text);
                    last.span = last.span.merge(Span::new(start, end));
                    return;
                }
            }
        }
        self.tokens.push(Token::new(kind, text, Span::new(start, end)));
    }

    /// Re-tags everything emitted since the last `\n` as `kind`.
    ///
    /// Tokens that straddle the newline are split at it.
    pub(crate) fn retag_line_tail(&mut self, kind: TokenKind) {
        let mut tail: Vec<Token> = Vec::new();
        while let Some(mut token) = self.tokens.pop() {
            if let Some(newline) = token.text.rfind('\n') {
                let split = newline + 1;
                if split < token.text.len() {
                    let moved = token.text.split_off(split);
                    let boundary =
                        ByteOffset::from_usize(token.span.start.as_usize() + split);
                    tail.push(Token::new(token.kind, moved, Span::new(boundary, token.span.end)));
                    token.span = Span::new(token.span.start, boundary);
                }
                self.tokens.push(token);
                break;
            }
            tail.push(token);
        }

        for mut token in tail.into_iter().rev() {
            token.kind = kind;
            match self.tokens.last_mut() {
                Some(last) if last.kind == kind && last.span.end == token.span.start => {
                    last.text.push_str(&token.text);
                    last.span = last.span.merge(token.span);
                }
                _ => self.tokens.push(token),
            }
        }
    }

    /// Returns the collected tokens.
    pub(crate) fn finish(self) -> Vec<Token> {
        self.tokens
    }

    /// Kind of the most recently collected token.
    pub(crate) fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|token| token.kind)
    }
}
