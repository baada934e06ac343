//! Command keyword catalogs: risk prefixes and plotting commands.
//!
//! Stata accepts any prefix of a command name down to a minimum length, so
//! every catalog entry is a `(word, minimum)` pair matched as a whole word.

use std::sync::LazyLock;

use regex::Regex;

/// Prefixes that change whether a statement echoes.
const RISK_PREFIXES: &[(&str, usize)] = &[("capture", 3), ("quietly", 3), ("noisily", 1)];

/// Prefixes that suppress the echo of what they wrap.
const SILENCING_PREFIXES: &[(&str, usize)] = &[("capture", 3), ("quietly", 3)];

/// Grouping prefixes that end in `:` (`by x:`, `bysort g:`).
const BY_PREFIXES: &[(&str, usize)] = &[("bysort", 3), ("by", 2)];

/// Commands that draw a graph.
const PLOT_COMMANDS: &[(&str, usize)] = &[
    ("twoway", 2),
    ("scatter", 2),
    ("line", 4),
    ("histogram", 4),
    ("kdensity", 5),
    ("lowess", 6),
    ("lpoly", 5),
    ("tsline", 6),
    ("tsrline", 7),
    ("rvfplot", 7),
    ("rvpplot", 7),
    ("avplot", 6),
    ("avplots", 7),
    ("cprplot", 7),
    ("acprplot", 8),
    ("lvr2plot", 8),
    ("qnorm", 5),
    ("pnorm", 5),
    ("qqplot", 6),
    ("symplot", 7),
    ("quantile", 8),
];

/// `graph` subcommands that never draw.
const NON_DRAWING_GRAPH_SUBCOMMANDS: &[&str] = &[
    "close", "copy", "describe", "dir", "drop", "export", "print", "query", "rename", "save",
    "set",
];

/// Builds a pattern accepting `word` and each prefix down to `minimum` chars.
///
/// `abbreviation_pattern("quietly", 3)` yields `qui(?:e(?:t(?:l(?:y)?)?)?)?`.
pub fn abbreviation_pattern(word: &str, minimum: usize) -> String {
    let minimum = minimum.clamp(1, word.len());
    let (required, optional) = word.split_at(minimum);
    let mut pattern = regex::escape(required);
    let mut tail = String::new();
    for ch in optional.chars().rev() {
        tail = format!("(?:{}{})?", regex::escape(&ch.to_string()), tail);
    }
    pattern.push_str(&tail);
    pattern
}

fn alternation(catalog: &[(&str, usize)]) -> String {
    catalog
        .iter()
        .map(|(word, minimum)| abbreviation_pattern(word, *minimum))
        .collect::<Vec<_>>()
        .join("|")
}

fn whole_word(catalog: &[(&str, usize)]) -> Regex {
    let pattern = format!(r"^(?:{})$", alternation(catalog));
    Regex::new(&pattern).expect("catalog patterns are escaped")
}

static RISK_PREFIX_WORD: LazyLock<Regex> = LazyLock::new(|| whole_word(RISK_PREFIXES));
static SILENCING_WORD: LazyLock<Regex> = LazyLock::new(|| whole_word(SILENCING_PREFIXES));
static BY_WORD: LazyLock<Regex> = LazyLock::new(|| whole_word(BY_PREFIXES));
static PLOT_WORD: LazyLock<Regex> = LazyLock::new(|| whole_word(PLOT_COMMANDS));
static GRAPH_WORD: LazyLock<Regex> = LazyLock::new(|| whole_word(&[("graph", 2)]));

/// Returns `true` when any line of `text` starts with a risk prefix,
/// possibly after grouping prefixes.
pub fn contains_risk_prefix(text: &str) -> bool {
    text.lines().any(|line| statement_head(line).prefixed)
}

/// Leading prefixes of one statement and the command that follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHead<'a> {
    /// `true` when any risk prefix wraps the command.
    pub prefixed: bool,
    /// `true` when a capture or quietly prefix wraps the command.
    pub silenced: bool,
    /// The command word, if any.
    pub command: &'a str,
    /// Text after the command word.
    pub rest: &'a str,
}

/// Splits the risk and grouping prefixes off a statement.
pub fn statement_head(line: &str) -> StatementHead<'_> {
    let mut rest = line.trim_start();
    let mut prefixed = false;
    let mut silenced = false;
    loop {
        let (word, after) = split_word(rest);
        if word.is_empty() {
            break;
        }
        if RISK_PREFIX_WORD.is_match(word) {
            prefixed = true;
            silenced |= SILENCING_WORD.is_match(word);
            rest = after.trim_start();
            rest = rest.strip_prefix(':').unwrap_or(rest).trim_start();
            continue;
        }
        if BY_WORD.is_match(word) {
            match after.find(':') {
                Some(colon) => {
                    rest = after[colon + 1..].trim_start();
                    continue;
                }
                None => break,
            }
        }
        break;
    }

    let (command, after) = split_word(rest);
    StatementHead {
        prefixed,
        silenced,
        command,
        rest: after,
    }
}

/// Splits at the end of the leading word (letters, digits, `_`).
fn split_word(text: &str) -> (&str, &str) {
    let end = text
        .char_indices()
        .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
        .map_or(text.len(), |(index, _)| index);
    text.split_at(end)
}

/// Plot command catalog extended with user keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotCatalog {
    user_keywords: Vec<String>,
}

impl PlotCatalog {
    /// Creates a catalog with extra exact-match `user_keywords`.
    pub fn new(user_keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_keywords: user_keywords
                .into_iter()
                .map(Into::into)
                .filter(|keyword: &String| !keyword.trim().is_empty())
                .map(|keyword| keyword.trim().to_string())
                .collect(),
        }
    }

    /// Returns `true` when `line` draws a graph.
    pub fn is_plot_line(&self, line: &str) -> bool {
        let head = statement_head(line);
        if head.command.is_empty() {
            return false;
        }
        if GRAPH_WORD.is_match(head.command) {
            let (subcommand, _) = split_word(head.rest.trim_start());
            return !NON_DRAWING_GRAPH_SUBCOMMANDS.contains(&subcommand);
        }
        PLOT_WORD.is_match(head.command)
            || self.user_keywords.iter().any(|keyword| keyword == head.command)
    }
}
