//! String-literal state helpers shared by both passes.

use crate::lexer::cursor::{Cursor, PrevClass};
use crate::lexer::mode::{LexMode, ModeStack};

/// Opening marker of a string literal.
pub(crate) const COMPOUND_OPEN: &str = "`\"";
/// Closing marker of a compound string literal.
pub(crate) const COMPOUND_CLOSE: &str = "\"'";

/// Returns the string mode opened at the cursor, consuming the opener.
pub(crate) fn try_open_string(cursor: &mut Cursor, input: &str) -> Option<LexMode> {
    if cursor.starts_with(input, COMPOUND_OPEN) {
        cursor.advance_chars(2, input);
        return Some(LexMode::StringCompound(1));
    }
    if cursor.peek(input) == Some('"') && cursor.prev() != PrevClass::Other('`') {
        cursor.advance(input);
        return Some(LexMode::StringRegular);
    }
    None
}

/// Advances one step inside a string mode.
///
/// A regular string closes on `"` not followed by `'` and is abandoned,
/// without consuming, at a line end. Compound strings nest. Returns `false`
/// when nothing was consumed.
pub(crate) fn scan_string_step(cursor: &mut Cursor, input: &str, stack: &mut ModeStack) -> bool {
    match stack.top() {
        LexMode::StringRegular => match cursor.peek(input) {
            Some('\n') => {
                stack.pop();
                return false;
            }
            Some('"') if cursor.peek_nth(input, 1) != Some('\'') => {
                cursor.advance(input);
                stack.pop();
            }
            _ => {
                cursor.advance(input);
            }
        },
        LexMode::StringCompound(_) => {
            if cursor.starts_with(input, COMPOUND_OPEN) {
                cursor.advance_chars(2, input);
                stack.push(LexMode::StringCompound(1));
            } else if cursor.starts_with(input, COMPOUND_CLOSE) {
                cursor.advance_chars(2, input);
                stack.pop();
            } else {
                cursor.advance(input);
            }
        }
        _ => {
            cursor.advance(input);
        }
    }
    true
}

/// Returns `true` when `mode` is a string mode.
pub(crate) fn is_string_mode(mode: LexMode) -> bool {
    matches!(mode, LexMode::StringRegular | LexMode::StringCompound(_))
}
