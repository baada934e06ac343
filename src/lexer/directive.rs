//! Line-level keyword recognizers: `#delimit`, block openers, and `end`.

use std::sync::LazyLock;

use regex::Regex;

/// A `#delimit` directive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimitDirective {
    /// `#delimit ;`
    Explicit,
    /// `#delimit cr`
    Newline,
}

static DELIMIT_EXPLICIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#d(?:e|el|eli|elim|elimi|elimit)?\s*;\s*$").expect("valid #delimit ; pattern")
});

static DELIMIT_NEWLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#d(?:e|el|eli|elim|elimi|elimit)?\s+cr\s*$")
        .expect("valid #delimit cr pattern")
});

static MATA_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*mata\s*:?\s*$").expect("valid mata pattern"));

static END_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*end(?:\s|[^\w.]|$)").expect("valid end pattern"));

static PROGRAM_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*pr(?:o|og|ogr|ogra|ogram)?[ \t]+(\S+)").expect("valid program pattern")
});

static INPUT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*inp(?:u|ut)?\b").expect("valid input pattern"));

/// Classifies one physical line as a `#delimit` directive.
///
/// Any abbreviation from `#d` to `#delimit` is accepted.
pub fn match_delimit_directive(line: &str) -> Option<DelimitDirective> {
    if DELIMIT_EXPLICIT.is_match(line) {
        Some(DelimitDirective::Explicit)
    } else if DELIMIT_NEWLINE.is_match(line) {
        Some(DelimitDirective::Newline)
    } else {
        None
    }
}

/// Returns `true` for a bare `mata` or `mata:` line.
pub fn opens_mata_line(line: &str) -> bool {
    MATA_OPEN.is_match(line)
}

/// Returns `true` when the first word of `line` is `end`.
pub fn starts_with_end_word(line: &str) -> bool {
    END_WORD.is_match(line)
}

/// Returns `true` when `line` opens a block closed by an `end` line.
///
/// Covers `program [define] name` (but not `program drop|dir|list`),
/// `input`, and bare `mata` lines.
pub fn opens_end_block(line: &str) -> bool {
    if let Some(captures) = PROGRAM_OPEN.captures(line) {
        let word = captures.get(1).map_or("", |word| word.as_str());
        return !(word.starts_with("di") || word.starts_with("dr") || word.starts_with('l'));
    }
    INPUT_OPEN.is_match(line) || opens_mata_line(line)
}
