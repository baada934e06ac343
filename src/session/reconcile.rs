//! Lines up captured log text with the lines a chunk submitted.
//!
//! Echo matching is layered. Exact forms (`. line`, `  3. line`, `> line`,
//! `: line`) are trusted. The loose prefix heuristic is accepted only for
//! block lines, whose echoes are reformatted by the process. A direct
//! statement that matches only loosely is reported as ambiguous.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::cache::CachePaths;
use crate::chunk::{EchoKind, ExpectedLine};
use crate::session::error::ReconcileError;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\x1b(?:",
        r"(?:\[\??\d+[hl])|",
        r"(?:[=<>a-kzNM78])|",
        r"(?:[()][a-b0-2])|",
        r"(?:\[\d{0,2}[ma-dgkjqi])|",
        r"(?:\[\d+;\d+[hfy]?)|",
        r"(?:\[;?[hf])|",
        r"(?:#[3-68])|",
        r"(?:[01356]n)|",
        r"(?:O[mlnp-z]?)|",
        r"(?:/Z)|",
        r"(?:\d+)|",
        r"(?:\[\?\d;\d0c)|",
        r"(?:\d;\dR))"
    ))
    .expect("valid ANSI escape pattern")
});

static NUMBERED_ECHO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s{1,2}(.*)$").expect("valid numbered echo pattern"));

static GRAPH_WRITTEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(?:note: )?file (?P<path>.+?/graph\d+\.\w+) (?:written|saved)")
        .expect("valid graph note pattern")
});

static GRAPH_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(?:note: )?file (?P<path>.+?/graph\d+\.\w+) not found\)?")
        .expect("valid graph note pattern")
});

/// How strongly an output line was tied to a submitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    /// Echo text equals the submitted line.
    Exact,
    /// Echo text is only a prefix of, or prefixed by, the submitted line.
    Heuristic,
}

/// Result of reconciling one capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Output lines between the first echo and the sentinel echo.
    pub output: String,
    /// Graph files reported as written.
    pub artifacts: Vec<PathBuf>,
    /// Number of expected lines whose echo was found.
    pub matched: usize,
    /// Whether the sentinel echo was seen.
    pub sentinel_seen: bool,
    /// First problem found; the fields above still hold what was recovered.
    pub error: Option<ReconcileError>,
}

/// Normalizes newlines and strips terminal escape sequences.
pub fn normalize_output(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    ANSI_ESCAPE.replace_all(&text, "").into_owned()
}

/// Joins `> ` continuation lines onto the echo they wrap.
pub fn join_wrapped_echoes(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if let (Some(rest), Some(previous)) = (line.strip_prefix("> "), lines.last_mut()) {
            if is_echo_like(previous) {
                previous.push_str(rest);
                continue;
            }
        }
        lines.push(line.to_string());
    }
    lines
}

fn is_echo_like(line: &str) -> bool {
    line.starts_with(". ") || line == "." || NUMBERED_ECHO.is_match(line)
}

/// Text after the echo marker, when `line` looks like an echo.
fn echo_content(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('.') {
        return rest.strip_prefix(' ').map(|rest| rest.strip_prefix(' ').unwrap_or(rest));
    }
    if let Some(rest) = line.strip_prefix("> ").or_else(|| line.strip_prefix(": ")) {
        return Some(rest);
    }
    NUMBERED_ECHO
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|content| content.as_str())
}

/// Compares one output line with one submitted line.
pub fn match_echo(line: &str, expected: &str) -> Option<MatchQuality> {
    let content = echo_content(line)?.trim();
    let expected = expected.trim();
    if content == expected {
        return Some(MatchQuality::Exact);
    }
    if !content.is_empty() && (expected.starts_with(content) || content.starts_with(expected)) {
        return Some(MatchQuality::Heuristic);
    }
    None
}

/// Matches `raw` against the expected echoes and extracts the output.
///
/// Lines are walked in order. Only silent lines may be skipped. With a
/// nonzero `return_code` the expected list is cut at the first line whose
/// echo is missing; with a zero code a missing echo is an error.
pub fn reconcile(
    raw: &str,
    expected: &[ExpectedLine],
    sentinel: &str,
    return_code: i32,
    cache: &CachePaths,
) -> Reconciled {
    let normalized = normalize_output(raw);
    let lines = join_wrapped_echoes(&normalized);
    let cache_root = cache.root_for_commands();

    let mut result = Reconciled::default();
    let mut next = 0usize;
    let mut started = false;
    let mut output: Vec<String> = Vec::new();

    for line in &lines {
        if match_echo(line, sentinel) == Some(MatchQuality::Exact) {
            result.sentinel_seen = true;
            break;
        }

        if let Some((index, quality)) = find_echo(line, expected, next) {
            if quality == MatchQuality::Heuristic
                && expected[index].kind != EchoKind::Block
                && result.error.is_none()
            {
                result.error = Some(ReconcileError::Ambiguous {
                    line: expected[index].text.clone(),
                    echo: line.clone(),
                });
            }
            next = index + 1;
            result.matched += 1;
            started = true;
            continue;
        }

        if let Some(captures) = GRAPH_WRITTEN.captures(line) {
            let path = &captures["path"];
            if path.starts_with(&cache_root) {
                result.artifacts.push(PathBuf::from(path));
                continue;
            }
        }
        if GRAPH_NOT_FOUND
            .captures(line)
            .is_some_and(|captures| captures["path"].starts_with(&cache_root))
        {
            continue;
        }
        if started {
            output.push(line.clone());
        }
    }

    let missing = expected[next..]
        .iter()
        .find(|line| line.kind != EchoKind::Silent);
    if let Some(missing) = missing {
        if return_code == 0 && result.error.is_none() {
            warn!(line = %missing.text, "echo not found");
            result.error = Some(ReconcileError::EchoNotFound {
                line: missing.text.clone(),
            });
        } else {
            debug!(return_code, line = %missing.text, "expected lines truncated at error");
        }
    }
    if return_code == 0 && !result.sentinel_seen && result.error.is_none() {
        result.error = Some(ReconcileError::SentinelMissing {
            sentinel: sentinel.to_string(),
        });
    }

    result.output = trim_blank_lines(&output);
    result
}

/// Finds the expected line `line` echoes, skipping only silent lines.
fn find_echo(
    line: &str,
    expected: &[ExpectedLine],
    start: usize,
) -> Option<(usize, MatchQuality)> {
    for (index, candidate) in expected.iter().enumerate().skip(start) {
        if let Some(quality) = match_echo(line, &candidate.text) {
            return Some((index, quality));
        }
        if candidate.kind != EchoKind::Silent {
            break;
        }
    }
    None
}

fn trim_blank_lines(lines: &[String]) -> String {
    let first = lines.iter().position(|line| !line.trim().is_empty());
    let last = lines.iter().rposition(|line| !line.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}
