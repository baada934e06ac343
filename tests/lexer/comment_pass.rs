use stata_engine::lexer::{CommentEndState, DelimiterMode, TokenKind, scan_comments};

fn collect_tokens(input: &str) -> Vec<(TokenKind, String)> {
    scan_comments(input, DelimiterMode::Newline)
        .tokens
        .into_iter()
        .map(|token| (token.kind, token.text))
        .collect()
}

#[test]
fn double_slash_after_whitespace_runs_to_line_end() {
    let tokens = collect_tokens("sum x // note\ndi 1\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "sum x ".to_string()),
            (TokenKind::CommentLine, "// note".to_string()),
            (TokenKind::PlainText, "\ndi 1\n".to_string()),
        ]
    );
}

#[test]
fn double_slash_inside_word_is_plain_text() {
    let tokens = collect_tokens("di 5//2\n");
    assert_eq!(tokens, vec![(TokenKind::PlainText, "di 5//2\n".to_string())]);
}

#[test]
fn star_at_line_start_comments_the_line_only() {
    let tokens = collect_tokens("* star comment\nsum x\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentLine, "* star comment".to_string()),
            (TokenKind::PlainText, "\nsum x\n".to_string()),
        ]
    );

    let tokens = collect_tokens("  * indented\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentLine, "  * indented".to_string()),
            (TokenKind::PlainText, "\n".to_string()),
        ]
    );
}

#[test]
fn star_after_text_is_multiplication() {
    let tokens = collect_tokens("gen y = x * 2\n");
    assert_eq!(tokens, vec![(TokenKind::PlainText, "gen y = x * 2\n".to_string())]);
}

#[test]
fn block_comments_nest() {
    let tokens = collect_tokens("/* a /* b */ c */ sum\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentBlock, "/* a /* b */ c */".to_string()),
            (TokenKind::PlainText, " sum\n".to_string()),
        ]
    );
}

#[test]
fn star_after_closing_block_comment_swallows_the_line() {
    let tokens = collect_tokens("/* a */ * tail\nsum\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentBlock, "/* a */ * tail".to_string()),
            (TokenKind::PlainText, "\nsum\n".to_string()),
        ]
    );
}

#[test]
fn block_comment_inside_star_comment_spans_lines() {
    let scan = scan_comments("* /* a\na\n*/", DelimiterMode::Newline);
    let tokens: Vec<_> = scan
        .tokens
        .iter()
        .map(|token| (token.kind, token.text.as_str()))
        .collect();
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentLine, "* "),
            (TokenKind::CommentBlock, "/* a\na\n*/"),
        ]
    );
    assert_eq!(scan.end_state, CommentEndState::Clean);
}

#[test]
fn unterminated_block_comment_reports_depth() {
    let scan = scan_comments("* /* a\na", DelimiterMode::Newline);
    assert_eq!(scan.end_state, CommentEndState::UnterminatedBlockComment { depth: 1 });

    let scan = scan_comments("/* outer /* inner", DelimiterMode::Newline);
    assert_eq!(scan.end_state, CommentEndState::UnterminatedBlockComment { depth: 2 });
}

#[test]
fn continuation_joins_physical_lines() {
    let scan = scan_comments("a ///\na", DelimiterMode::Newline);
    let tokens: Vec<_> = scan
        .tokens
        .iter()
        .map(|token| (token.kind, token.text.as_str()))
        .collect();
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "a "),
            (TokenKind::CommentContinuation, "///\n"),
            (TokenKind::PlainText, "a"),
        ]
    );
    assert_eq!(scan.stripped_text(), "a a");
    assert_eq!(scan.end_state, CommentEndState::Clean);
}

#[test]
fn continuation_at_end_of_input_is_pending() {
    let scan = scan_comments("sum x ///", DelimiterMode::Newline);
    assert_eq!(scan.end_state, CommentEndState::PendingContinuation);

    let scan = scan_comments("sum x ///\n", DelimiterMode::Newline);
    assert_eq!(scan.end_state, CommentEndState::PendingContinuation);
}

#[test]
fn double_slash_ends_continuation_early() {
    let tokens = collect_tokens("di 1 /// more // note\n2\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "di 1 ".to_string()),
            (TokenKind::CommentContinuation, "/// more ".to_string()),
            (TokenKind::CommentLine, "// note".to_string()),
            (TokenKind::PlainText, "\n2\n".to_string()),
        ]
    );
}

#[test]
fn triple_slash_in_star_comment_continues_onto_next_line() {
    let tokens = collect_tokens("* note ///\ncontinued\nsum\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::CommentLine, "* note ///\n".to_string()),
            (TokenKind::CommentContinuation, "continued\n".to_string()),
            (TokenKind::PlainText, "sum\n".to_string()),
        ]
    );
}

#[test]
fn comment_markers_inside_strings_are_inert() {
    let tokens = collect_tokens("di \"/* no */\" // yes\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "di ".to_string()),
            (TokenKind::StringLiteral, "\"/* no */\"".to_string()),
            (TokenKind::PlainText, " ".to_string()),
            (TokenKind::CommentLine, "// yes".to_string()),
            (TokenKind::PlainText, "\n".to_string()),
        ]
    );
}

#[test]
fn compound_string_keeps_inner_quotes() {
    let tokens = collect_tokens("di `\"a \"quoted\" b\"' // c\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "di ".to_string()),
            (TokenKind::StringLiteral, "`\"a \"quoted\" b\"'".to_string()),
            (TokenKind::PlainText, " ".to_string()),
            (TokenKind::CommentLine, "// c".to_string()),
            (TokenKind::PlainText, "\n".to_string()),
        ]
    );
}

#[test]
fn regular_string_is_abandoned_at_line_end() {
    let tokens = collect_tokens("di \"open\nsum x // c\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "di ".to_string()),
            (TokenKind::StringLiteral, "\"open".to_string()),
            (TokenKind::PlainText, "\nsum x ".to_string()),
            (TokenKind::CommentLine, "// c".to_string()),
            (TokenKind::PlainText, "\n".to_string()),
        ]
    );
}

#[test]
fn star_lines_inside_mata_are_code() {
    let tokens = collect_tokens("mata:\n* not a comment\nend\n* comment\n");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::PlainText, "mata:\n* not a comment\nend\n".to_string()),
            (TokenKind::CommentLine, "* comment".to_string()),
            (TokenKind::PlainText, "\n".to_string()),
        ]
    );
}

#[test]
fn spans_index_the_scanned_text() {
    let input = "sum x /* c */ if y // z\n";
    let scan = scan_comments(input, DelimiterMode::Newline);
    for token in &scan.tokens {
        assert_eq!(&input[token.span.start.as_usize()..token.span.end.as_usize()], token.text);
    }
    assert_eq!(scan.stripped_text(), "sum x  if y \n");
}
