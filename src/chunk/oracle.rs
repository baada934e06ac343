//! Completeness decisions for partial input buffers.

use crate::chunk::SourceAnalysis;
use crate::chunk::magic::{parse_magic, rewrite_help};
use crate::lexer::{CommentEndState, DelimiterMode, IncompleteReason, TokenKind};

/// Completeness verdict for one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completeness {
    /// `None` when the buffer can be submitted.
    pub incomplete: Option<IncompleteReason>,
    /// Delimiter mode the session holds after the buffer runs.
    pub next_mode: DelimiterMode,
}

impl Completeness {
    /// Returns `true` when the buffer can be submitted.
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }
}

/// Decides whether `code` is submittable when the session is in `mode`.
pub fn check_complete(code: &str, mode: DelimiterMode) -> Completeness {
    if parse_magic(code).is_some() || rewrite_help(code).is_some() {
        return Completeness {
            incomplete: None,
            next_mode: mode,
        };
    }
    let analysis = SourceAnalysis::new(code, mode);
    Completeness {
        incomplete: incomplete_reason(&analysis),
        next_mode: analysis.final_mode(),
    }
}

/// Applies the block, comment, and terminator rules in priority order.
pub fn incomplete_reason(analysis: &SourceAnalysis) -> Option<IncompleteReason> {
    if analysis.blocks.open_blocks > 0 {
        return Some(IncompleteReason::UnclosedBlock);
    }
    match analysis.comments.end_state {
        CommentEndState::UnterminatedBlockComment { .. } => {
            return Some(IncompleteReason::UnterminatedBlockComment);
        }
        CommentEndState::PendingContinuation => {
            return Some(IncompleteReason::PendingContinuation);
        }
        CommentEndState::Clean => {}
    }
    if analysis.final_mode().is_explicit() && !unterminated_tail(analysis).trim().is_empty() {
        return Some(IncompleteReason::MissingTerminator);
    }
    None
}

/// Raw text after the last terminator, or after the directive that entered
/// explicit mode when no terminator follows it.
fn unterminated_tail(analysis: &SourceAnalysis) -> &str {
    let after_terminator = analysis
        .comments
        .tokens
        .iter()
        .rev()
        .find(|token| token.kind == TokenKind::SemicolonDelimiter)
        .map_or(0, |token| token.span.end.as_usize());
    let after_directive = analysis
        .comments
        .explicit_since
        .map_or(0, |offset| offset.as_usize());
    let start = after_terminator.max(after_directive);
    analysis.normalized.get(start..).unwrap_or("")
}

/// Outcome of feeding one line to an [`InputAccumulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorStep {
    /// The buffer is complete and has been taken out of the accumulator.
    Complete {
        /// Accumulated source text.
        code: String,
        /// Delimiter mode after the code runs.
        next_mode: DelimiterMode,
    },
    /// More input is required.
    NeedMore(IncompleteReason),
}

/// Collects input lines until they form a submittable buffer.
#[derive(Debug, Clone, Default)]
pub struct InputAccumulator {
    buffer: String,
    mode: DelimiterMode,
}

impl InputAccumulator {
    /// Creates an empty accumulator for a session in `mode`.
    pub fn new(mode: DelimiterMode) -> Self {
        Self {
            buffer: String::new(),
            mode,
        }
    }

    /// Appends one line and re-checks completeness.
    pub fn push_line(&mut self, line: &str) -> AccumulatorStep {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line.trim_end_matches(['\r', '\n']));

        let verdict = check_complete(&self.buffer, self.mode);
        match verdict.incomplete {
            Some(reason) => AccumulatorStep::NeedMore(reason),
            None => {
                self.mode = verdict.next_mode;
                AccumulatorStep::Complete {
                    code: std::mem::take(&mut self.buffer),
                    next_mode: verdict.next_mode,
                }
            }
        }
    }

    /// Text collected so far.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Delimiter mode the next buffer starts in.
    pub fn mode(&self) -> DelimiterMode {
        self.mode
    }

    /// Drops any pending text.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
