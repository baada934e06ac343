//! Explicit lexer mode stack.

/// One scanning mode.
///
/// Nesting of the same construct is tracked by the depth counter carried in
/// the variant rather than by repeated stack entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Ordinary text.
    Root,
    /// Inside `/* ... */`.
    CommentBlock(u32),
    /// Inside a `*` line comment.
    CommentStar,
    /// Inside a `//` comment.
    CommentLine,
    /// Inside the remainder of a `///` line.
    CommentContinuation,
    /// Inside `{ ... }`.
    BlockBody(u32),
    /// Inside a block closed by an `end` line.
    EndBlock,
    /// Inside `"..."`.
    StringRegular,
    /// Inside `` `"..."' ``.
    StringCompound(u32),
}

/// Stack of active modes; the bottom entry is always [`LexMode::Root`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeStack {
    modes: Vec<LexMode>,
}

impl Default for ModeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeStack {
    /// Creates a stack holding only `Root`.
    pub fn new() -> Self {
        Self {
            modes: vec![LexMode::Root],
        }
    }

    /// Returns the innermost mode.
    pub fn top(&self) -> LexMode {
        self.modes.last().copied().unwrap_or(LexMode::Root)
    }

    /// Enters `mode`.
    ///
    /// Entering a depth-carrying mode that is already on top increments its
    /// depth instead of adding an entry.
    pub fn push(&mut self, mode: LexMode) {
        match (self.modes.last_mut(), mode) {
            (Some(LexMode::CommentBlock(depth)), LexMode::CommentBlock(_))
            | (Some(LexMode::BlockBody(depth)), LexMode::BlockBody(_))
            | (Some(LexMode::StringCompound(depth)), LexMode::StringCompound(_)) => {
                *depth += 1;
            }
            _ => self.modes.push(mode),
        }
    }

    /// Leaves the innermost mode, or one level of its depth.
    ///
    /// `Root` is never popped.
    pub fn pop(&mut self) {
        match self.modes.last_mut() {
            Some(LexMode::CommentBlock(depth))
            | Some(LexMode::BlockBody(depth))
            | Some(LexMode::StringCompound(depth))
                if *depth > 1 =>
            {
                *depth -= 1;
            }
            Some(LexMode::Root) | None => {}
            Some(_) => {
                self.modes.pop();
            }
        }
    }

    /// Replaces the innermost mode with `mode`.
    pub fn replace(&mut self, mode: LexMode) {
        if self.top() != LexMode::Root {
            self.modes.pop();
        }
        self.modes.push(mode);
    }

    /// Returns `true` when only `Root` is active.
    pub fn is_root(&self) -> bool {
        self.modes.len() == 1
    }

    /// Sum of open block nesting (brace depth plus `end` blocks).
    pub fn open_blocks(&self) -> u32 {
        self.modes
            .iter()
            .map(|mode| match mode {
                LexMode::BlockBody(depth) => *depth,
                LexMode::EndBlock => 1,
                _ => 0,
            })
            .sum()
    }

    /// Returns `true` when any block mode is on the stack.
    pub fn in_block(&self) -> bool {
        self.open_blocks() > 0
    }
}
