//! Meta-command escapes: `%name args` and `?topic`.

use std::sync::LazyLock;

use regex::Regex;

static MAGIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A%(?P<name>\S+?)(?:\s+(?P<args>.*))?\z").expect("valid magic pattern")
});

/// A parsed `%name args` escape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicCommand {
    /// Name after `%`.
    pub name: String,
    /// Remaining text, trimmed.
    pub args: String,
}

/// Parses a whole buffer as a meta-command escape.
pub fn parse_magic(code: &str) -> Option<MagicCommand> {
    let captures = MAGIC.captures(code.trim())?;
    let name = captures.name("name")?.as_str().to_string();
    let args = captures
        .name("args")
        .map_or(String::new(), |args| args.as_str().trim().to_string());
    Some(MagicCommand { name, args })
}

/// Rewrites a `?topic` buffer to `help topic`.
pub fn rewrite_help(code: &str) -> Option<String> {
    let topic = code.trim().strip_prefix('?')?.trim();
    if topic.is_empty() || topic.contains('\n') {
        return None;
    }
    Some(format!("help {topic}"))
}
