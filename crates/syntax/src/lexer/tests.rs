use super::*;

fn kinds(src: &str) -> Vec<TokenKind> {
  let mut lexer = Lexer::new(src);
  let mut out = Vec::new();
  loop {
    let tok = lexer.next_token();
    let done = tok.kind == TokenKind::Eof;
    out.push(tok.kind);
    if done {
      break;
    }
  }
  out
}

#[test]
fn numbers_do_not_consume_double_dot() {
  let mut lexer = Lexer::new("5..10");
  let a = lexer.next_token();
  let b = lexer.next_token();
  let c = lexer.next_token();
  assert_eq!(a.kind, TokenKind::Int);
  assert_eq!(a.lexeme.as_ref(), "5");
  assert_eq!(b.kind, TokenKind::DotDot);
  assert_eq!(c.kind, TokenKind::Int);
  assert_eq!(c.lexeme.as_ref(), "10");
}

#[test]
fn float_requires_digit_after_dot() {
  let mut lexer = Lexer::new("5.5");
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::Float);
  assert_eq!(tok.lexeme.as_ref(), "5.5");
}

#[test]
fn keywords_are_recognized() {
  assert_eq!(
    kinds("let fn return if else for while in class self true false nil print"),
    vec![
      TokenKind::Let,
      TokenKind::Fn,
      TokenKind::Return,
      TokenKind::If,
      TokenKind::Else,
      TokenKind::For,
      TokenKind::While,
      TokenKind::In,
      TokenKind::Class,
      TokenKind::SelfKw,
      TokenKind::True,
      TokenKind::False,
      TokenKind::Nil,
      TokenKind::Print,
      TokenKind::Eof,
    ]
  );
}

#[test]
fn unterminated_string_is_an_error_token() {
  let mut lexer = Lexer::new("\"abc");
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::Error);
  assert_eq!(tok.message, Some("Unterminated string"));
}

#[test]
fn string_escape_is_copied_verbatim() {
  let mut lexer = Lexer::new(r#""a\"b""#);
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::String);
  assert_eq!(tok.lexeme.as_ref(), r#""a\"b""#);
}

#[test]
fn lone_ampersand_is_an_error() {
  let mut lexer = Lexer::new("a & b");
  let _ = lexer.next_token(); // `a`
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::Error);
}

#[test]
fn doubled_ampersand_is_an_operator() {
  let mut lexer = Lexer::new("a && b");
  let _ = lexer.next_token(); // `a`
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::AmpAmp);
}

#[test]
fn line_numbers_track_newlines() {
  let mut lexer = Lexer::new("let x\nlet y\n\nlet z");
  let toks: Vec<_> = std::iter::from_fn(|| {
    let t = lexer.next_token();
    (t.kind != TokenKind::Eof).then_some(t)
  })
  .collect();
  let lines: Vec<u32> = toks.iter().map(|t| t.line).collect();
  assert_eq!(lines, vec![1, 1, 2, 2, 4, 4]);
}

#[test]
fn bom_is_stripped() {
  let mut lexer = Lexer::new("\u{feff}let x");
  let tok = lexer.next_token();
  assert_eq!(tok.kind, TokenKind::Let);
  assert_eq!(tok.span.start, 0);
}

#[test]
fn eof_repeats_forever() {
  let mut lexer = Lexer::new("");
  assert_eq!(lexer.next_token().kind, TokenKind::Eof);
  assert_eq!(lexer.next_token().kind, TokenKind::Eof);
  assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}

#[test]
fn line_comment_runs_to_end_of_line() {
  assert_eq!(
    kinds("let x // trailing comment\nlet y"),
    vec![
      TokenKind::Let,
      TokenKind::Identifier,
      TokenKind::Let,
      TokenKind::Identifier,
      TokenKind::Eof,
    ]
  );
}
