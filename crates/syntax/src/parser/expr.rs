//! Expression grammar, tightest to loosest:
//! primary -> postfix chain -> unary -> mul/div/mod -> add/sub -> relational
//! -> equality -> and -> or -> assignment (right-associative).

use ast::{AssignTarget, BinaryOp, Expr, ExprKind, Literal, UnaryOp};

use super::*;
use crate::lexer::TokenKind::*;

impl<'src> Parser<'src> {
  pub(super) fn expression(&mut self) -> Expr<'src> {
    self.guarded(Self::assignment)
  }

  fn assignment(&mut self) -> Expr<'src> {
    let target = self.or_expr();
    if self.match_tok(Equal) {
      let line = self.line();
      let value = self.assignment();
      let target = match target.kind {
        ExprKind::Ident(name) => AssignTarget::Ident(name),
        ExprKind::Field(obj, name) => AssignTarget::Field(obj, name),
        ExprKind::Index(obj, idx) => AssignTarget::Index(obj, idx),
        _ => {
          self.error_at_current("Invalid assignment target");
          AssignTarget::Ident(Cow::borrowed(""))
        }
      };
      return Expr {
        line,
        kind: ExprKind::Assign(Box::new(target), Box::new(value)),
      };
    }
    target
  }

  fn or_expr(&mut self) -> Expr<'src> {
    let mut left = self.and_expr();
    while self.match_tok(Or) {
      let line = self.line();
      let right = self.and_expr();
      left = Expr {
        line,
        kind: ExprKind::Binary(BinaryOp::Or, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn and_expr(&mut self) -> Expr<'src> {
    let mut left = self.equality();
    while self.match_tok(And) {
      let line = self.line();
      let right = self.equality();
      left = Expr {
        line,
        kind: ExprKind::Binary(BinaryOp::And, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn equality(&mut self) -> Expr<'src> {
    let mut left = self.relational();
    loop {
      let op = if self.match_tok(EqualEqual) {
        BinaryOp::Eq
      } else if self.match_tok(BangEqual) {
        BinaryOp::Ne
      } else {
        break;
      };
      let line = self.line();
      let right = self.relational();
      left = Expr {
        line,
        kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn relational(&mut self) -> Expr<'src> {
    let mut left = self.additive();
    loop {
      let op = if self.match_tok(Less) {
        BinaryOp::Lt
      } else if self.match_tok(LessEqual) {
        BinaryOp::Le
      } else if self.match_tok(Greater) {
        BinaryOp::Gt
      } else if self.match_tok(GreaterEqual) {
        BinaryOp::Ge
      } else {
        break;
      };
      let line = self.line();
      let right = self.additive();
      left = Expr {
        line,
        kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn additive(&mut self) -> Expr<'src> {
    let mut left = self.multiplicative();
    loop {
      let op = if self.match_tok(Plus) {
        BinaryOp::Add
      } else if self.match_tok(Minus) {
        BinaryOp::Sub
      } else {
        break;
      };
      let line = self.line();
      let right = self.multiplicative();
      left = Expr {
        line,
        kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn multiplicative(&mut self) -> Expr<'src> {
    let mut left = self.unary();
    loop {
      let op = if self.match_tok(Star) {
        BinaryOp::Mul
      } else if self.match_tok(Slash) {
        BinaryOp::Div
      } else if self.match_tok(Percent) {
        BinaryOp::Mod
      } else {
        break;
      };
      let line = self.line();
      let right = self.unary();
      left = Expr {
        line,
        kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
      };
    }
    left
  }

  fn unary(&mut self) -> Expr<'src> {
    if self.match_tok(Minus) {
      let line = self.line();
      let operand = self.unary();
      return Expr {
        line,
        kind: ExprKind::Unary(UnaryOp::Neg, Box::new(operand)),
      };
    }
    if self.match_tok(Not) || self.match_tok(Bang) {
      let line = self.line();
      let operand = self.unary();
      return Expr {
        line,
        kind: ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
      };
    }
    self.postfix()
  }

  fn postfix(&mut self) -> Expr<'src> {
    let mut expr = self.primary();
    loop {
      if self.match_tok(LParen) {
        let line = self.line();
        let mut args = Vec::new();
        if !self.check(RParen) {
          loop {
            args.push(self.expression());
            if !self.match_tok(Comma) {
              break;
            }
          }
        }
        self.expect(RParen, "Expected ')' after arguments");
        expr = Expr {
          line,
          kind: ExprKind::Call(Box::new(expr), args),
        };
      } else if self.match_tok(Dot) {
        let line = self.line();
        let name = self.ident();
        expr = Expr {
          line,
          kind: ExprKind::Field(Box::new(expr), name),
        };
      } else if self.match_tok(LBracket) {
        let line = self.line();
        let index = self.expression();
        self.expect(RBracket, "Expected ']' after index");
        expr = Expr {
          line,
          kind: ExprKind::Index(Box::new(expr), Box::new(index)),
        };
      } else {
        break;
      }
    }
    expr
  }

  fn primary(&mut self) -> Expr<'src> {
    let line = self.current.line;

    if self.match_tok(Int) {
      let text = self.previous.lexeme.as_ref();
      let value = text.parse::<i64>().unwrap_or(0);
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::Int(value)),
      };
    }
    if self.match_tok(Float) {
      let text = self.previous.lexeme.as_ref();
      let value = text.parse::<f64>().unwrap_or(0.0);
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::Float(value)),
      };
    }
    if self.match_tok(TokenKind::String) {
      let raw = self.previous.lexeme.as_ref();
      let inner = &raw[1..raw.len() - 1];
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::String(Cow::owned(inner.to_string()))),
      };
    }
    if self.match_tok(True) {
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::Bool(true)),
      };
    }
    if self.match_tok(False) {
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::Bool(false)),
      };
    }
    if self.match_tok(Nil) {
      return Expr {
        line,
        kind: ExprKind::Literal(Literal::Nil),
      };
    }
    if self.match_tok(SelfKw) {
      return Expr {
        line,
        kind: ExprKind::Ident(Cow::borrowed("self")),
      };
    }
    if self.check(Identifier) {
      let name = self.ident();
      return Expr {
        line,
        kind: ExprKind::Ident(name),
      };
    }
    if self.match_tok(LParen) {
      let inner = self.expression();
      self.expect(RParen, "Expected ')' after expression");
      return inner;
    }
    if self.match_tok(LBracket) {
      let mut elements = Vec::new();
      if !self.check(RBracket) {
        loop {
          elements.push(self.expression());
          if !self.match_tok(Comma) {
            break;
          }
        }
      }
      self.expect(RBracket, "Expected ']' after array elements");
      return Expr {
        line,
        kind: ExprKind::Array(elements),
      };
    }
    if self.match_tok(LBrace) {
      // reserved map-literal syntax: `{ key: value, ... }`
      let mut entries = Vec::new();
      if !self.check(RBrace) {
        loop {
          let key = self.expression();
          self.expect(Colon, "Expected ':' in map literal");
          let value = self.expression();
          entries.push((key, value));
          if !self.match_tok(Comma) {
            break;
          }
        }
      }
      self.expect(RBrace, "Expected '}' after map literal");
      return Expr {
        line,
        kind: ExprKind::Map(entries),
      };
    }

    self.error_at_current("Expected expression");
    Expr {
      line,
      kind: ExprKind::Literal(Literal::Nil),
    }
  }
}
