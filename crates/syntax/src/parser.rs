//! Recursive-descent parser with a Pratt-style precedence cascade for
//! expressions. Parses by hand, with no parser-combinator crate: a one-token
//! lookahead (`current`/`previous`) and a panic-mode flag that suppresses
//! every diagnostic but the first in a given error window.

use beef::lean::Cow;

use crate::ast::{self, Module};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::Error;

mod expr;
mod stmt;

#[cfg(test)]
mod tests;

pub struct Parser<'src> {
  lexer: Lexer<'src>,
  previous: Token<'src>,
  current: Token<'src>,
  had_error: bool,
  panic_mode: bool,
  errors: Vec<Error>,
}

pub fn parse(src: &str) -> Result<Module<'_>, Vec<Error>> {
  let mut parser = Parser::new(src);
  let module = parser.module();
  if parser.had_error {
    Err(parser.errors)
  } else {
    Ok(module)
  }
}

impl<'src> Parser<'src> {
  fn new(src: &'src str) -> Self {
    let mut lexer = Lexer::new(src);
    let first = lexer.next_token();
    Parser {
      lexer,
      previous: first.clone(),
      current: first,
      had_error: false,
      panic_mode: false,
      errors: Vec::new(),
    }
  }

  /// Expression and statement recursion share the real call stack; grow it
  /// on demand so a deeply nested program doesn't blow it before the parser
  /// gets a chance to report a sane error.
  #[cfg(feature = "check-recursion-limit")]
  fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || f(self))
  }

  #[cfg(not(feature = "check-recursion-limit"))]
  fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
    f(self)
  }

  fn module(&mut self) -> Module<'src> {
    let mut body = Vec::new();
    while !self.check(TokenKind::Eof) {
      body.push(self.statement());
      if self.panic_mode {
        self.synchronize();
      }
    }
    Module { body }
  }

  fn advance(&mut self) {
    self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    if self.current.kind == TokenKind::Error {
      let message = self.current.message.unwrap_or("Unexpected character");
      self.error_at_current(message);
      // keep advancing past consecutive error tokens so a single bad run of
      // input doesn't reopen the panic window on every byte.
      while self.current.kind == TokenKind::Error {
        self.current = self.lexer.next_token();
      }
    }
  }

  fn check(&self, kind: TokenKind) -> bool {
    self.current.kind == kind
  }

  fn match_tok(&mut self, kind: TokenKind) -> bool {
    if !self.check(kind) {
      return false;
    }
    self.advance();
    true
  }

  fn expect(&mut self, kind: TokenKind, message: &'static str) {
    if self.check(kind) {
      self.advance();
    } else {
      self.error_at_current(message);
    }
  }

  fn ident(&mut self) -> ast::Ident<'src> {
    if self.check(TokenKind::Identifier) {
      let lexeme = self.current.lexeme.clone();
      self.advance();
      lexeme
    } else {
      self.error_at_current("Expected identifier");
      Cow::borrowed("")
    }
  }

  fn line(&self) -> u32 {
    self.previous.line
  }

  fn error_at_current(&mut self, message: &'static str) {
    let token = self.current.clone();
    self.error_at(&token, message);
  }

  fn error_at(&mut self, token: &Token<'src>, message: &'static str) {
    if self.panic_mode {
      return;
    }
    self.panic_mode = true;
    self.had_error = true;

    let where_ = if token.kind == TokenKind::Eof {
      Cow::borrowed("at end")
    } else {
      Cow::from(format!("at '{}'", token.lexeme))
    };
    self.errors.push(Error::new(
      format!("line {}: {} ({})", token.line, message, where_),
      token.span,
    ));
  }

  /// Skip tokens until the next statement-starter or EOF, closing the panic
  /// window opened by the last diagnostic.
  fn synchronize(&mut self) {
    self.panic_mode = false;

    while !self.check(TokenKind::Eof) {
      if self.previous.kind == TokenKind::Semicolon {
        return;
      }
      use TokenKind::*;
      match self.current.kind {
        Let | Fn | If | While | For | Return | Import | Class | Server | Print | Respond => {
          return
        }
        _ => self.advance(),
      }
    }
  }
}
