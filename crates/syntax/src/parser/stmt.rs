//! Statement grammar. Dispatches on the current token's kind; anything that
//! doesn't start a known statement head is parsed as an expression
//! statement.

use ast::{
  Class, ClassMember, Fn, ForIn, ForRange, If, Import, Let, Param, Route, Server, Stmt, StmtKind,
  While,
};

use super::*;
use crate::lexer::TokenKind::*;

impl<'src> Parser<'src> {
  pub(super) fn statement(&mut self) -> Stmt<'src> {
    self.guarded(Self::statement_inner)
  }

  fn statement_inner(&mut self) -> Stmt<'src> {
    let line = self.current.line;
    let kind = match self.current.kind {
      Let => self.let_stmt(),
      If => self.if_stmt(),
      While => self.while_stmt(),
      For => self.for_stmt(),
      Fn => self.fn_stmt(),
      Return => self.return_stmt(),
      Import => self.import_stmt(),
      Class => self.class_stmt(),
      Server => self.server_stmt(),
      Print | Respond => self.print_stmt(),
      Break => {
        self.advance();
        StmtKind::Break
      }
      Continue => {
        self.advance();
        StmtKind::Continue
      }
      LBrace => StmtKind::Block(self.block()),
      _ => StmtKind::Expr(Box::new(self.expression())),
    };
    self.match_tok(Semicolon);
    Stmt { line, kind }
  }

  fn block(&mut self) -> Vec<Stmt<'src>> {
    self.expect(LBrace, "Expected '{'");
    let mut body = Vec::new();
    while !self.check(RBrace) && !self.check(Eof) {
      body.push(self.statement());
      if self.panic_mode {
        break;
      }
    }
    self.expect(RBrace, "Expected '}' after block");
    body
  }

  fn let_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `let`
    let name = self.ident();
    let type_name = if self.check(Identifier) {
      Some(self.ident())
    } else {
      None
    };
    let init = if self.match_tok(Equal) {
      Some(self.expression())
    } else {
      None
    };
    StmtKind::Let(Box::new(Let {
      name,
      type_name,
      init,
    }))
  }

  fn if_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `if`
    let cond = self.expression();
    let then_branch = self.block();
    let else_branch = if self.match_tok(Else) {
      if self.check(If) {
        Some(vec![Stmt {
          line: self.current.line,
          kind: self.if_stmt(),
        }])
      } else {
        Some(self.block())
      }
    } else {
      None
    };
    StmtKind::If(Box::new(If {
      cond,
      then_branch,
      else_branch,
    }))
  }

  fn while_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `while`
    let cond = self.expression();
    let body = self.block();
    StmtKind::While(Box::new(While { cond, body }))
  }

  fn for_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `for`
    let var = self.ident();
    self.expect(In, "Expected 'in' after for-loop variable");
    let start = self.expression();
    if self.match_tok(DotDot) {
      let end = self.expression();
      let body = self.block();
      StmtKind::ForRange(Box::new(ForRange {
        var,
        start,
        end,
        body,
      }))
    } else {
      let body = self.block();
      StmtKind::ForIn(Box::new(ForIn {
        var,
        iter: start,
        body,
      }))
    }
  }

  fn params(&mut self) -> Vec<Param<'src>> {
    self.expect(LParen, "Expected '(' after function name");
    let mut params = Vec::new();
    if !self.check(RParen) {
      loop {
        let name = self.ident();
        let type_name = if self.check(Identifier) {
          Some(self.ident())
        } else {
          None
        };
        params.push(Param { name, type_name });
        if !self.match_tok(Comma) {
          break;
        }
      }
    }
    self.expect(RParen, "Expected ')' after parameters");
    params
  }

  fn fn_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `fn`
    let name = self.ident();
    let params = self.params();
    let return_type = if self.match_tok(Arrow) {
      Some(self.ident())
    } else {
      None
    };
    let body = self.block();
    StmtKind::Fn(Box::new(Fn {
      name,
      params,
      return_type,
      body,
    }))
  }

  fn return_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `return`
    let value = if self.check(Semicolon) || self.check(RBrace) || self.check(Eof) {
      None
    } else {
      Some(Box::new(self.expression()))
    };
    StmtKind::Return(value)
  }

  fn print_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `print` or `respond`
    self.expect(LParen, "Expected '(' after print");
    let value = self.expression();
    self.expect(RParen, "Expected ')' after print argument");
    StmtKind::Print(Box::new(value))
  }

  fn import_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `import`
    let path = self.ident();
    StmtKind::Import(Box::new(Import { path }))
  }

  fn class_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `class`
    let name = self.ident();
    self.expect(LBrace, "Expected '{' after class name");
    let mut members = Vec::new();
    while !self.check(RBrace) && !self.check(Eof) {
      if self.check(Fn) {
        let inner = self.fn_stmt();
        if let StmtKind::Fn(f) = inner {
          members.push(ClassMember::Method(*f));
        }
      } else {
        let field_name = self.ident();
        let type_name = if self.check(Identifier) {
          Some(self.ident())
        } else {
          None
        };
        members.push(ClassMember::Field(field_name, type_name));
      }
      self.match_tok(Semicolon);
      if self.panic_mode {
        break;
      }
    }
    self.expect(RBrace, "Expected '}' after class body");
    StmtKind::Class(Box::new(Class { name, members }))
  }

  fn server_stmt(&mut self) -> StmtKind<'src> {
    self.advance(); // `server`
    let name = self.ident();
    let port = if self.match_tok(On) {
      if self.match_tok(Int) {
        self.previous.lexeme.as_ref().parse::<i64>().ok()
      } else {
        self.error_at_current("Expected port number after 'on'");
        None
      }
    } else {
      None
    };
    self.expect(LBrace, "Expected '{' after server name");
    let mut routes = Vec::new();
    while !self.check(RBrace) && !self.check(Eof) {
      self.expect(Route, "Expected 'route' inside server block");
      let method = self.ident();
      self.expect(TokenKind::String, "Expected path string after route method");
      let raw = self.previous.lexeme.as_ref();
      let path = Cow::owned(raw[1..raw.len() - 1].to_string());
      let binding = if self.match_tok(LBracket) {
        let name = self.ident();
        self.expect(RBracket, "Expected ']' after route binding");
        Some(name)
      } else {
        None
      };
      let body = self.block();
      routes.push(Route {
        method,
        path,
        binding,
        body,
      });
      if self.panic_mode {
        break;
      }
    }
    self.expect(RBrace, "Expected '}' after server body");
    StmtKind::Server(Box::new(Server { name, port, routes }))
  }
}
