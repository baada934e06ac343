use sha2::{Digest, Sha256};
use stata_engine::cache::CachePaths;
use stata_engine::chunk::{
    AssemblerSettings, Chunk, EchoKind, ExpectedLine, SessionContext, SourceAnalysis, assemble,
    statement_text,
};
use stata_engine::lexer::{DelimiterMode, scan_comments};

const EXPORT_LINE: &str = concat!(
    "noi gr export \"/tmp/cache/graph${stata_kernel_graph_counter}.svg\", ",
    "width(600) height(400) replace"
);
const INCREMENT_LINE: &str =
    "global stata_kernel_graph_counter = ${stata_kernel_graph_counter} + 1";
const INCLUDE_LINE: &str = "include \"/tmp/cache/include.do\"";

fn settings() -> AssemblerSettings {
    AssemblerSettings::new(CachePaths::new("/tmp/cache"))
}

fn assemble_with(code: &str, context: &mut SessionContext) -> Chunk {
    let analysis = SourceAnalysis::new(code, context.delimiter_mode);
    assemble(&analysis, &settings(), context)
}

fn assemble_fresh(code: &str) -> Chunk {
    assemble_with(code, &mut SessionContext::default())
}

fn kinds(chunk: &Chunk) -> Vec<EchoKind> {
    chunk.exclusion_lines.iter().map(|line| line.kind).collect()
}

#[test]
fn plain_statements_are_sent_directly() {
    let chunk = assemble_fresh("sum x // mean\ndi 1\n");

    assert_eq!(chunk.body, vec!["sum x".to_string(), "di 1".to_string()]);
    assert!(!chunk.requires_indirection);
    assert_eq!(chunk.submission, format!("sum x\ndi 1\n`{}'", chunk.fingerprint));
    assert_eq!(
        chunk.exclusion_lines,
        vec![
            ExpectedLine::new("sum x", EchoKind::Statement),
            ExpectedLine::new("di 1", EchoKind::Statement),
        ]
    );
}

#[test]
fn fingerprint_hashes_the_joined_body() {
    let chunk = assemble_fresh("sum x\ndi 1");
    let expected = hex::encode(Sha256::digest(b"sum x\ndi 1"));

    assert_eq!(chunk.fingerprint, expected);
    assert_eq!(chunk.sentinel(), format!("`{expected}'"));
    assert_eq!(assemble_fresh("sum x\ndi 1").fingerprint, chunk.fingerprint);
    assert_ne!(assemble_fresh("sum x\ndi 2").fingerprint, chunk.fingerprint);
}

#[test]
fn plot_line_gets_export_and_increment() {
    let mut context = SessionContext {
        delimiter_mode: DelimiterMode::Newline,
        plot_counter: 4,
    };
    let chunk = assemble_with("scatter y x", &mut context);

    assert_eq!(
        chunk.body,
        vec!["scatter y x".to_string(), EXPORT_LINE.to_string(), INCREMENT_LINE.to_string()]
    );
    assert_eq!(chunk.plots_injected, 1);
    assert_eq!(context.plot_counter, 5);
    assert!(!chunk.requires_indirection);
}

#[test]
fn every_plot_line_gets_its_own_pair() {
    let mut context = SessionContext::default();
    let chunk = assemble_with(
        "sysuse auto\ntw scatter price mpg\nsum price\nhist mpg",
        &mut context,
    );

    assert_eq!(chunk.body.len(), 8);
    assert_eq!(chunk.body[1], "tw scatter price mpg");
    assert_eq!(chunk.body[2], EXPORT_LINE);
    assert_eq!(chunk.body[3], INCREMENT_LINE);
    assert_eq!(chunk.body[4], "sum price");
    assert_eq!(chunk.body[6], EXPORT_LINE);
    assert_eq!(context.plot_counter, 2);
    assert!(chunk.requires_indirection);
}

#[test]
fn non_drawing_graph_commands_get_no_export() {
    let mut context = SessionContext::default();
    let chunk = assemble_with("graph export out.png, replace", &mut context);

    assert_eq!(chunk.body, vec!["graph export out.png, replace".to_string()]);
    assert_eq!(context.plot_counter, 0);
}

#[test]
fn risk_prefix_routes_through_include_script() {
    let chunk = assemble_fresh("cap drop x");

    assert!(chunk.requires_indirection);
    assert_eq!(chunk.submission, format!("{INCLUDE_LINE}\n`{}'", chunk.fingerprint));
    assert_eq!(
        chunk.exclusion_lines,
        vec![
            ExpectedLine::new(INCLUDE_LINE, EchoKind::Statement),
            ExpectedLine::new("cap drop x", EchoKind::Silent),
        ]
    );
    assert_eq!(chunk.script_text(), "cap drop x\n");
}

#[test]
fn prefix_words_inside_expressions_stay_direct() {
    let chunk = assemble_fresh("gen y = n + 1
replace q = cap * 2");

    assert!(!chunk.requires_indirection);
    assert_eq!(kinds(&chunk), vec![EchoKind::Statement, EchoKind::Statement]);
}

#[test]
fn blocks_route_through_include_script() {
    let chunk = assemble_fresh("foreach v in a b {\n di `v'\n}");

    assert!(chunk.requires_indirection);
    assert_eq!(
        chunk.body,
        vec!["foreach v in a b {".to_string(), "di `v'".to_string(), "}".to_string()]
    );
    assert_eq!(
        kinds(&chunk),
        vec![EchoKind::Statement, EchoKind::Block, EchoKind::Block, EchoKind::Block]
    );
}

#[test]
fn silenced_block_lines_may_not_echo() {
    let chunk = assemble_fresh("qui {\n sum x\n}\ndi 1");

    assert_eq!(
        kinds(&chunk),
        vec![
            EchoKind::Statement,
            EchoKind::Silent,
            EchoKind::Silent,
            EchoKind::Silent,
            EchoKind::Statement,
        ]
    );
}

#[test]
fn plot_inside_block_is_followed_inside_the_block() {
    let mut context = SessionContext::default();
    let chunk = assemble_with("foreach v in a b {\n scatter `v' x\n}", &mut context);

    assert_eq!(chunk.body[1], "scatter `v' x");
    assert_eq!(chunk.body[2], EXPORT_LINE);
    assert_eq!(chunk.body[3], INCREMENT_LINE);
    assert_eq!(chunk.body[4], "}");
    assert_eq!(chunk.exclusion_lines[3].kind, EchoKind::Block);
    assert_eq!(context.plot_counter, 1);
}

#[test]
fn line_count_threshold_triggers_indirection() {
    assert!(!assemble_fresh("a\nb\nc").requires_indirection);
    assert!(assemble_fresh("a\nb\nc\nd").requires_indirection);

    let mut settings = settings();
    settings.indirection_line_threshold = 10;
    let analysis = SourceAnalysis::new("a\nb\nc\nd", DelimiterMode::Newline);
    let chunk = assemble(&analysis, &settings, &mut SessionContext::default());
    assert!(!chunk.requires_indirection);
}

#[test]
fn comment_only_input_yields_empty_chunk() {
    let mut context = SessionContext::default();
    let chunk = assemble_with("// only a comment\n\n", &mut context);

    assert!(chunk.is_empty());
    assert!(chunk.submission.is_empty());
    assert!(chunk.exclusion_lines.is_empty());
    assert_eq!(
        chunk.fingerprint,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(context.plot_counter, 0);
}

#[test]
fn explicit_mode_statements_become_single_lines() {
    let mut context = SessionContext::default();
    let chunk = assemble_with("#delimit ;\nreg y\n x, robust;\n", &mut context);

    assert_eq!(chunk.body, vec!["reg y  x, robust".to_string()]);
    assert_eq!(context.delimiter_mode, DelimiterMode::SEMICOLON);

    let chunk = assemble_with("sum y; sum z;", &mut context);
    assert_eq!(chunk.body, vec!["sum y".to_string(), "sum z".to_string()]);
}

#[test]
fn statement_text_drops_comments() {
    let scan = scan_comments("sum x /* c */ if y\n", DelimiterMode::Newline);
    assert_eq!(statement_text(&scan), "sum x  if y\n");

    let scan = scan_comments("sum x\n, detail; di 1;", DelimiterMode::SEMICOLON);
    assert_eq!(statement_text(&scan), "sum x , detail\n di 1\n");
}
