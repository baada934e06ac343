//! Chunk layer: completeness decisions and submission assembly.
//!
//! [`SourceAnalysis`] runs both lexer passes over one buffer. The oracle
//! reads it to decide whether the buffer can be submitted, and the
//! assembler turns it into a [`Chunk`].

pub mod assembler;
pub mod keywords;
pub mod magic;
pub mod oracle;

pub use assembler::{
    AssemblerSettings, Chunk, EchoKind, ExpectedLine, GraphExport, SessionContext, assemble,
};
pub use keywords::{PlotCatalog, StatementHead, abbreviation_pattern, statement_head};
pub use magic::{MagicCommand, parse_magic, rewrite_help};
pub use oracle::{AccumulatorStep, Completeness, InputAccumulator, check_complete};

use crate::lexer::{
    BlockScan, CommentScan, DelimiterMode, TokenKind, normalize_newlines, scan_blocks,
    scan_comments,
};

/// Both lexer passes over one input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAnalysis {
    /// Newline-normalized input.
    pub normalized: String,
    /// Delimiter mode the buffer started in.
    pub initial_mode: DelimiterMode,
    /// First pass result.
    pub comments: CommentScan,
    /// Second pass result over [`SourceAnalysis::clean_text`].
    pub blocks: BlockScan,
    /// Comment-free text with one statement per line.
    pub clean_text: String,
}

impl SourceAnalysis {
    /// Runs both passes over `code` starting in `mode`.
    pub fn new(code: &str, mode: DelimiterMode) -> Self {
        let normalized = normalize_newlines(code);
        let comments = scan_comments(&normalized, mode);
        let clean_text = statement_text(&comments);
        let blocks = scan_blocks(&clean_text);
        Self {
            normalized,
            initial_mode: mode,
            comments,
            blocks,
            clean_text,
        }
    }

    /// Delimiter mode in effect after the buffer.
    pub fn final_mode(&self) -> DelimiterMode {
        self.comments.final_mode
    }
}

/// Drops comments and rewrites explicit terminators as newlines.
///
/// Newlines inside explicit-mode statement text become spaces, so each
/// output line holds exactly one statement.
pub fn statement_text(scan: &CommentScan) -> String {
    let mut text = String::with_capacity(scan.tokens.iter().map(|token| token.text.len()).sum());
    for token in &scan.tokens {
        match token.kind {
            kind if kind.is_comment() => {}
            TokenKind::SemicolonDelimiter => text.push('\n'),
            TokenKind::NamespaceBody => {
                text.extend(token.text.chars().map(|ch| if ch == '\n' { ' ' } else { ch }));
            }
            _ => text.push_str(&token.text),
        }
    }
    text
}
