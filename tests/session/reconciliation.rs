use std::path::PathBuf;

use stata_engine::cache::CachePaths;
use stata_engine::chunk::{EchoKind, ExpectedLine};
use stata_engine::session::{ReconcileError, reconcile};

const SENTINEL: &str = "`0123abcd'";

fn line(text: &str, kind: EchoKind) -> ExpectedLine {
    ExpectedLine {
        text: text.to_string(),
        kind,
    }
}

fn cache() -> CachePaths {
    CachePaths::new("/tmp/cache")
}

#[test]
fn output_is_collected_between_echoes() {
    let raw = ". sum x\n\n    Variable |  Obs\n. di 1\n1\n. `0123abcd'\n";
    let expected = [line("sum x", EchoKind::Statement), line("di 1", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(result.output, "    Variable |  Obs\n1");
    assert_eq!(result.matched, 2);
    assert!(result.sentinel_seen);
    assert_eq!(result.error, None);
}

#[test]
fn nonzero_code_truncates_expected_lines() {
    let raw = ". sum x\n. di y\nvariable y not found\nr(111);\n";
    let expected = [
        line("sum x", EchoKind::Statement),
        line("di y", EchoKind::Statement),
        line("di 2", EchoKind::Statement),
    ];

    let result = reconcile(raw, &expected, SENTINEL, 111, &cache());

    assert_eq!(result.output, "variable y not found\nr(111);");
    assert_eq!(result.matched, 2);
    assert_eq!(result.error, None);
}

#[test]
fn missing_echo_with_success_code_is_an_error() {
    let raw = ". sum x\nout\n. `0123abcd'\n";
    let expected = [line("sum x", EchoKind::Statement), line("di 1", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(
        result.error,
        Some(ReconcileError::EchoNotFound {
            line: "di 1".to_string(),
        })
    );
    assert_eq!(result.output, "out");
}

#[test]
fn missing_sentinel_with_success_code_is_an_error() {
    let raw = ". sum x\nout\n";
    let expected = [line("sum x", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(
        result.error,
        Some(ReconcileError::SentinelMissing {
            sentinel: SENTINEL.to_string(),
        })
    );
    assert_eq!(result.output, "out");
}

#[test]
fn silent_lines_may_be_missing() {
    let raw = ". di 1\n1\n. `0123abcd'\n";
    let expected = [line("cap drop x", EchoKind::Silent), line("di 1", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(result.error, None);
    assert_eq!(result.output, "1");
}

#[test]
fn block_echoes_match_numbered_forms() {
    let raw = ". foreach v in a b {\n  2.     di \"`v'\"\n  3. }\na\nb\n. `0123abcd'\n";
    let expected = [
        line("foreach v in a b {", EchoKind::Block),
        line("di \"`v'\"", EchoKind::Block),
        line("}", EchoKind::Block),
    ];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(result.error, None);
    assert_eq!(result.matched, 3);
    assert_eq!(result.output, "a\nb");
}

#[test]
fn loose_match_of_direct_statement_is_ambiguous() {
    let raw = ". di\n1\n. `0123abcd'\n";
    let expected = [line("di 1", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(
        result.error,
        Some(ReconcileError::Ambiguous {
            line: "di 1".to_string(),
            echo: ". di".to_string(),
        })
    );
    assert_eq!(result.output, "1");
}

#[test]
fn graph_notes_become_artifacts() {
    let raw = concat!(
        ". scatter y x\n",
        ". noi gr export x\n",
        "(file /tmp/cache/graph0.svg written in SVG format)\n",
        "(file /tmp/cache/graph9.svg not found)\n",
        "(file /elsewhere/graph1.svg written in SVG format)\n",
        ". `0123abcd'\n"
    );
    let expected = [
        line("scatter y x", EchoKind::Statement),
        line("noi gr export x", EchoKind::Statement),
    ];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(result.artifacts, vec![PathBuf::from("/tmp/cache/graph0.svg")]);
    assert_eq!(result.output, "(file /elsewhere/graph1.svg written in SVG format)");
}

#[test]
fn terminal_noise_and_wrapped_echoes_are_normalized() {
    let raw = ". di \"aaaa\r\n> bbbb\"\r\n\x1b[1maaaabbbb\x1b[0m\r\n. `0123abcd'\r\n";
    let expected = [line("di \"aaaabbbb\"", EchoKind::Statement)];

    let result = reconcile(raw, &expected, SENTINEL, 0, &cache());

    assert_eq!(result.error, None);
    assert_eq!(result.output, "aaaabbbb");
}
