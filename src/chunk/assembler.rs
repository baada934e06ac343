//! Turns an analyzed buffer into one submittable chunk.

use sha2::{Digest, Sha256};

use crate::cache::{CachePaths, GRAPH_STEM};
use crate::chunk::SourceAnalysis;
use crate::chunk::keywords::{PlotCatalog, contains_risk_prefix, statement_head};
use crate::lexer::{BlockScan, DelimiterMode, TokenKind};

/// Global macro holding the number of the next exported graph.
pub const GRAPH_COUNTER_GLOBAL: &str = "stata_kernel_graph_counter";

/// Default body line count above which a chunk runs through the include script.
pub const DEFAULT_INDIRECTION_THRESHOLD: usize = 3;

/// State that survives between executions of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Current statement delimiter mode.
    pub delimiter_mode: DelimiterMode,
    /// Number of graph export pairs injected so far.
    pub plot_counter: u64,
}

/// How injected export lines write graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphExport {
    /// File extension, which also selects the export format.
    pub extension: String,
    /// Pixel width, when the format takes one.
    pub width: Option<u32>,
    /// Pixel height, when the format takes one.
    pub height: Option<u32>,
}

impl Default for GraphExport {
    fn default() -> Self {
        Self {
            extension: "svg".to_string(),
            width: Some(600),
            height: Some(400),
        }
    }
}

impl GraphExport {
    /// The export line injected after a plotting statement.
    pub fn export_line(&self, cache: &CachePaths) -> String {
        let mut size = String::new();
        if let Some(width) = self.width {
            size.push_str(&format!(" width({width})"));
        }
        if let Some(height) = self.height {
            size.push_str(&format!(" height({height})"));
        }
        format!(
            "noi gr export \"{}/{GRAPH_STEM}${{{GRAPH_COUNTER_GLOBAL}}}.{}\",{size} replace",
            cache.root_for_commands(),
            self.extension
        )
    }

    /// The counter increment injected after each export line.
    pub fn increment_line(&self) -> String {
        format!("global {GRAPH_COUNTER_GLOBAL} = ${{{GRAPH_COUNTER_GLOBAL}}} + 1")
    }
}

/// Inputs the assembler needs besides the source.
#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    /// Cache directory layout.
    pub cache: CachePaths,
    /// Graph export format and size.
    pub graph: GraphExport,
    /// Commands treated as drawing a graph.
    pub plots: PlotCatalog,
    /// Body line count above which indirection is used.
    pub indirection_line_threshold: usize,
}

impl AssemblerSettings {
    /// Settings with default graph export and threshold.
    pub fn new(cache: CachePaths) -> Self {
        Self {
            cache,
            graph: GraphExport::default(),
            plots: PlotCatalog::default(),
            indirection_line_threshold: DEFAULT_INDIRECTION_THRESHOLD,
        }
    }
}

/// How the echo of a submitted line shows up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoKind {
    /// Echoed verbatim after the prompt.
    Statement,
    /// Part of a block; echoed with numbering or continuation markers.
    Block,
    /// Under a capture or quietly prefix; the echo may be missing.
    Silent,
}

/// One line whose echo the reconciler must account for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedLine {
    /// Submitted text.
    pub text: String,
    /// Expected echo behavior.
    pub kind: EchoKind,
}

impl ExpectedLine {
    /// Builds an expected line.
    pub fn new(text: impl Into<String>, kind: EchoKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// One submittable unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Statement lines, including injected export lines.
    pub body: Vec<String>,
    /// `true` when the body runs through the include script.
    pub requires_indirection: bool,
    /// Hex SHA-256 of the newline-joined body.
    pub fingerprint: String,
    /// Text sent to the process: body or include line, then the sentinel.
    pub submission: String,
    /// Lines whose echoes precede the sentinel echo, in order.
    pub exclusion_lines: Vec<ExpectedLine>,
    /// Number of export pairs injected into the body.
    pub plots_injected: u32,
}

impl Chunk {
    /// Returns `true` when there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The sentinel line: the fingerprint quoted as a local macro reference,
    /// which the process echoes without producing output.
    pub fn sentinel(&self) -> String {
        format!("`{}'", self.fingerprint)
    }

    /// Contents of the include script for indirect chunks.
    pub fn script_text(&self) -> String {
        let mut script = self.body.join("\n");
        script.push('\n');
        script
    }

    /// Physical lines of [`Chunk::submission`].
    pub fn submission_lines(&self) -> impl Iterator<Item = &str> {
        self.submission.split('\n').filter(|line| !line.is_empty())
    }
}

/// Statement line with the block it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BodyLine {
    text: String,
    block: Option<usize>,
}

/// Assembles `analysis` into a chunk and advances the plot counter.
///
/// Never fails; a buffer with no statements yields an empty chunk.
pub fn assemble(
    analysis: &SourceAnalysis,
    settings: &AssemblerSettings,
    context: &mut SessionContext,
) -> Chunk {
    context.delimiter_mode = analysis.final_mode();

    let lines = body_lines(&analysis.blocks);
    // A block is silent when its opening line carries a silencing prefix.
    let mut seen_blocks = Vec::new();
    let mut silent_blocks = Vec::new();
    for line in &lines {
        if let Some(block) = line.block {
            if !seen_blocks.contains(&block) {
                seen_blocks.push(block);
                if statement_head(&line.text).silenced {
                    silent_blocks.push(block);
                }
            }
        }
    }

    let mut body = Vec::with_capacity(lines.len());
    let mut expected = Vec::with_capacity(lines.len());
    let mut plots_injected = 0u32;
    for line in &lines {
        let kind = match line.block {
            Some(block) if silent_blocks.contains(&block) => EchoKind::Silent,
            _ if statement_head(&line.text).silenced => EchoKind::Silent,
            Some(_) => EchoKind::Block,
            None => EchoKind::Statement,
        };
        body.push(line.text.clone());
        expected.push(ExpectedLine::new(line.text.clone(), kind));

        if settings.plots.is_plot_line(&line.text) {
            let injected_kind = match line.block {
                Some(block) if silent_blocks.contains(&block) => EchoKind::Silent,
                Some(_) => EchoKind::Block,
                None => EchoKind::Statement,
            };
            for injected in [
                settings.graph.export_line(&settings.cache),
                settings.graph.increment_line(),
            ] {
                expected.push(ExpectedLine::new(injected.clone(), injected_kind));
                body.push(injected);
            }
            plots_injected += 1;
        }
    }
    context.plot_counter += u64::from(plots_injected);

    let joined = body.join("\n");
    let fingerprint = hex::encode(Sha256::digest(joined.as_bytes()));
    if body.is_empty() {
        return Chunk {
            body,
            requires_indirection: false,
            fingerprint,
            submission: String::new(),
            exclusion_lines: Vec::new(),
            plots_injected,
        };
    }

    let source_text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let requires_indirection = analysis.blocks.has_block()
        || contains_risk_prefix(&source_text)
        || body.len() > settings.indirection_line_threshold;

    let sentinel = format!("`{fingerprint}'");
    let (submission, exclusion_lines) = if requires_indirection {
        let include = format!("include \"{}\"", settings.cache.include_for_commands());
        let mut lines = vec![ExpectedLine::new(include.clone(), EchoKind::Statement)];
        lines.extend(expected);
        (format!("{include}\n{sentinel}"), lines)
    } else {
        (format!("{joined}\n{sentinel}"), expected)
    };

    Chunk {
        body,
        requires_indirection,
        fingerprint,
        submission,
        exclusion_lines,
        plots_injected,
    }
}

/// Splits the block pass output into trimmed, non-blank statement lines.
fn body_lines(scan: &BlockScan) -> Vec<BodyLine> {
    let mut lines = Vec::new();
    let mut current = BodyLine {
        text: String::new(),
        block: None,
    };
    for (index, token) in scan.tokens.iter().enumerate() {
        let block = (token.kind == TokenKind::BlockBody).then_some(index);
        for (part_index, part) in token.text.split('\n').enumerate() {
            if part_index > 0 {
                lines.push(std::mem::replace(
                    &mut current,
                    BodyLine {
                        text: String::new(),
                        block: None,
                    },
                ));
            }
            if !part.is_empty() {
                current.text.push_str(part);
                if block.is_some() {
                    current.block = block;
                }
            }
        }
    }
    lines.push(current);

    lines
        .into_iter()
        .filter_map(|line| {
            let text = line.text.trim();
            (!text.is_empty()).then(|| BodyLine {
                text: text.to_string(),
                block: line.block,
            })
        })
        .collect()
}
