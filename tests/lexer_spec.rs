/// Spec tests for the Matiria scanner.
///
/// Each test scans a snippet and checks the produced token kinds; the
/// `lex` helper drops the trailing Eof so cases list only meaningful
/// tokens.
use matiria::lexer::{Scanner, TokenKind};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lex_all(source: &str) -> Vec<TokenKind> {
    let mut scanner = Scanner::new(source);
    let mut kinds = Vec::new();
    loop {
        let token = scanner.next_token();
        let done = token.kind == TokenKind::Eof;
        kinds.push(token.kind);
        if done {
            break;
        }
    }
    kinds
}

fn lex(source: &str) -> Vec<TokenKind> {
    lex_all(source)
        .into_iter()
        .filter(|k| *k != TokenKind::Eof)
        .collect()
}

fn lex_text(source: &str) -> Vec<String> {
    let mut scanner = Scanner::new(source);
    let mut texts = Vec::new();
    loop {
        let token = scanner.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        texts.push(token.text(source).to_string());
    }
    texts
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

#[test]
fn int_literal() {
    assert_eq!(lex("42"), vec![TokenKind::IntLiteral]);
}

#[test]
fn float_literal() {
    assert_eq!(lex("3.14"), vec![TokenKind::FloatLiteral]);
}

#[test]
fn dot_without_digit_ends_the_integer() {
    // '1.' is an int followed by a dot, not a float
    assert_eq!(lex("1."), vec![TokenKind::IntLiteral, TokenKind::Dot]);
}

#[test]
fn string_literal_single_quotes() {
    assert_eq!(lex("'hello'"), vec![TokenKind::StringLiteral]);
}

#[test]
fn string_keeps_raw_bytes() {
    assert_eq!(lex_text("'a\\nb'"), vec!["'a\\nb'"]);
}

#[test]
fn unterminated_string_is_invalid() {
    assert_eq!(lex("'oops"), vec![TokenKind::Invalid]);
}

#[test]
fn bool_literals_are_keywords() {
    assert_eq!(lex("true false"), vec![TokenKind::True, TokenKind::False]);
}

// ---------------------------------------------------------------------------
// Identifiers and keywords
// ---------------------------------------------------------------------------

#[test]
fn identifier() {
    assert_eq!(lex("someName"), vec![TokenKind::Identifier]);
}

#[test]
fn identifier_with_underscore_and_digits() {
    assert_eq!(lex("_tmp2"), vec![TokenKind::Identifier]);
}

#[test]
fn keywords() {
    assert_eq!(
        lex("fn return if else while for type"),
        vec![
            TokenKind::Fn,
            TokenKind::Return,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::For,
            TokenKind::Type,
        ]
    );
}

#[test]
fn type_keywords() {
    assert_eq!(
        lex("Int Float Bool String Any"),
        vec![
            TokenKind::Int,
            TokenKind::Float,
            TokenKind::Bool,
            TokenKind::String,
            TokenKind::Any,
        ]
    );
}

#[test]
fn keyword_prefix_is_identifier() {
    assert_eq!(lex("iffy"), vec![TokenKind::Identifier]);
    assert_eq!(lex("Integer"), vec![TokenKind::Identifier]);
}

// ---------------------------------------------------------------------------
// Operators and punctuation
// ---------------------------------------------------------------------------

#[test]
fn single_char_operators() {
    assert_eq!(
        lex("+ - * / % , : ; ."),
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::Comma,
            TokenKind::Colon,
            TokenKind::Semicolon,
            TokenKind::Dot,
        ]
    );
}

#[test]
fn brackets() {
    assert_eq!(
        lex("( ) [ ] { }"),
        vec![
            TokenKind::ParenL,
            TokenKind::ParenR,
            TokenKind::SqrL,
            TokenKind::SqrR,
            TokenKind::CurlyL,
            TokenKind::CurlyR,
        ]
    );
}

#[test]
fn two_char_operators() {
    assert_eq!(lex("->"), vec![TokenKind::Arrow]);
    assert_eq!(lex(":="), vec![TokenKind::Assign]);
    assert_eq!(lex("!="), vec![TokenKind::BangEqual]);
    assert_eq!(lex("=="), vec![TokenKind::Equal]);
    assert_eq!(lex("<="), vec![TokenKind::LessEqual]);
    assert_eq!(lex(">="), vec![TokenKind::GreaterEqual]);
    assert_eq!(lex("//"), vec![TokenKind::DoubleSlash]);
    assert_eq!(lex("&&"), vec![TokenKind::And]);
    assert_eq!(lex("||"), vec![TokenKind::Or]);
}

#[test]
fn single_equal_is_equality() {
    assert_eq!(lex("="), vec![TokenKind::Equal]);
}

#[test]
fn ellipsis() {
    assert_eq!(lex("..."), vec![TokenKind::Ellipsis]);
}

#[test]
fn two_dots_are_invalid() {
    assert_eq!(lex(".."), vec![TokenKind::Invalid]);
}

#[test]
fn pipe_is_a_token_double_pipe_is_or() {
    assert_eq!(lex("|"), vec![TokenKind::Pipe]);
    assert_eq!(lex("||"), vec![TokenKind::Or]);
}

#[test]
fn bare_ampersand_is_invalid() {
    assert_eq!(lex("&"), vec![TokenKind::Invalid]);
}

#[test]
fn arrow_vs_minus() {
    assert_eq!(lex("- >"), vec![TokenKind::Minus, TokenKind::Greater]);
    assert_eq!(lex("->"), vec![TokenKind::Arrow]);
}

#[test]
fn assign_vs_colon() {
    assert_eq!(
        lex(": ="),
        vec![TokenKind::Colon, TokenKind::Equal]
    );
    assert_eq!(lex(":="), vec![TokenKind::Assign]);
}

// ---------------------------------------------------------------------------
// Comments and whitespace
// ---------------------------------------------------------------------------

#[test]
fn comment_runs_to_end_of_line() {
    assert_eq!(
        lex("# a comment\n42"),
        vec![TokenKind::Comment, TokenKind::IntLiteral]
    );
}

#[test]
fn comment_at_end_of_input() {
    assert_eq!(lex("42 # trailing"), vec![TokenKind::IntLiteral, TokenKind::Comment]);
}

#[test]
fn whitespace_is_skipped() {
    assert_eq!(
        lex("  1\t+\r\n 2 "),
        vec![TokenKind::IntLiteral, TokenKind::Plus, TokenKind::IntLiteral]
    );
}

// ---------------------------------------------------------------------------
// Invalid input and end of input
// ---------------------------------------------------------------------------

#[test]
fn unknown_byte_is_invalid() {
    assert_eq!(lex("@"), vec![TokenKind::Invalid]);
}

#[test]
fn scanning_continues_after_invalid() {
    assert_eq!(
        lex("1 @ 2"),
        vec![TokenKind::IntLiteral, TokenKind::Invalid, TokenKind::IntLiteral]
    );
}

#[test]
fn eof_is_idempotent() {
    let mut scanner = Scanner::new("x");
    assert_eq!(scanner.next_token().kind, TokenKind::Identifier);
    assert_eq!(scanner.next_token().kind, TokenKind::Eof);
    assert_eq!(scanner.next_token().kind, TokenKind::Eof);
    assert_eq!(scanner.next_token().kind, TokenKind::Eof);
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

#[test]
fn token_text_slices_the_source() {
    assert_eq!(lex_text("fib(n - 1)"), vec!["fib", "(", "n", "-", "1", ")"]);
}

#[test]
fn declaration_sequence() {
    assert_eq!(
        lex("Int x := 3;"),
        vec![
            TokenKind::Int,
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::IntLiteral,
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn function_header_sequence() {
    assert_eq!(
        lex("fn f(Int a) -> Int"),
        vec![
            TokenKind::Fn,
            TokenKind::Identifier,
            TokenKind::ParenL,
            TokenKind::Int,
            TokenKind::Identifier,
            TokenKind::ParenR,
            TokenKind::Arrow,
            TokenKind::Int,
        ]
    );
}

#[test]
fn native_body_sequence() {
    assert_eq!(
        lex("fn print(Any v) ..."),
        vec![
            TokenKind::Fn,
            TokenKind::Identifier,
            TokenKind::ParenL,
            TokenKind::Any,
            TokenKind::Identifier,
            TokenKind::ParenR,
            TokenKind::Ellipsis,
        ]
    );
}
