use ast::{ExprKind, StmtKind};

use super::*;
use crate::parse;

fn parse_ok(src: &str) -> ast::Module<'_> {
  parse(src).unwrap_or_else(|errs| panic!("unexpected parse errors: {errs:?}"))
}

#[test]
fn parses_let_with_initializer() {
  let module = parse_ok("let x = 1");
  assert_eq!(module.body.len(), 1);
  match &module.body[0].kind {
    StmtKind::Let(l) => {
      assert_eq!(l.name.as_ref(), "x");
      assert!(l.init.is_some());
    }
    other => panic!("expected let, got {other:?}"),
  }
}

#[test]
fn parses_for_range_vs_for_in() {
  let module = parse_ok("for i in 0..5 { print(i) }");
  assert!(matches!(module.body[0].kind, StmtKind::ForRange(_)));

  let module = parse_ok("for i in xs { print(i) }");
  assert!(matches!(module.body[0].kind, StmtKind::ForIn(_)));
}

#[test]
fn precedence_cascade_binds_tighter_operators_first() {
  // `1 + 2 * 3` must parse as `1 + (2 * 3)`.
  let module = parse_ok("1 + 2 * 3");
  let StmtKind::Expr(expr) = &module.body[0].kind else {
    panic!("expected expression statement");
  };
  let ExprKind::Binary(ast::BinaryOp::Add, lhs, rhs) = &expr.kind else {
    panic!("expected top-level add");
  };
  assert!(matches!(lhs.kind, ExprKind::Literal(ast::Literal::Int(1))));
  assert!(matches!(rhs.kind, ExprKind::Binary(ast::BinaryOp::Mul, ..)));
}

#[test]
fn assignment_is_right_associative_and_an_expression() {
  let module = parse_ok("x = y = 1");
  let StmtKind::Expr(expr) = &module.body[0].kind else {
    panic!("expected expression statement");
  };
  assert!(matches!(expr.kind, ExprKind::Assign(..)));
}

#[test]
fn reserved_constructs_parse_without_error() {
  parse_ok(
    r#"
    import net
    class Widget { fn tick() { return } }
    server app on 8080 {
      route GET "/" [req] { respond(req) }
    }
    "#,
  );
}

#[test]
fn panic_mode_recovers_at_next_statement() {
  // the malformed `let` (missing name) should produce exactly one
  // diagnostic, and parsing should still find the following `let y = 2`.
  let errs = parse("let ; let y = 2").unwrap_err();
  assert_eq!(errs.len(), 1);
}

#[test]
fn call_dot_and_index_chain_left_to_right() {
  let module = parse_ok("a.b[0](1)");
  let StmtKind::Expr(expr) = &module.body[0].kind else {
    panic!("expected expression statement");
  };
  assert!(matches!(expr.kind, ExprKind::Call(..)));
}
