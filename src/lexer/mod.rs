//! Two-pass Stata source lexer.
//!
//! The first pass ([`scan_comments`]) recognizes comments and resolves the
//! `#delimit` statement terminator. Its tokens always reconstruct the input.
//! The second pass ([`scan_blocks`]) runs on comment-free, newline-delimited
//! text and separates single statements from multi-line block constructs.
//!
//! Neither pass fails. Input that ends inside a construct is reported
//! through explicit end states ([`CommentEndState`], [`BlockScan::open_blocks`])
//! so callers can decide whether to wait for more input.

pub mod block;
pub mod comment;
pub mod directive;
pub mod mode;
pub mod span;
pub mod token;

mod cursor;
mod quote;

pub use block::{BlockScan, scan_blocks};
pub use comment::{CommentScan, scan_comments};
pub use directive::{DelimitDirective, match_delimit_directive};
pub use mode::{LexMode, ModeStack};
pub use span::{ByteOffset, Span};
pub use token::{CommentEndState, DelimiterMode, IncompleteReason, Token, TokenKind};

/// Converts `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_newlines(input: &str) -> String {
    if !input.contains('\r') {
        return input.to_string();
    }
    input.replace("\r\n", "\n").replace('\r', "\n")
}
