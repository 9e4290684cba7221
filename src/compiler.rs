//! Single-pass tree-walking compiler: walks the parsed module once, emitting
//! bytes through the chunk writer, resolving names to local slots or
//! global-name constants, and patching forward jumps once their targets are
//! known. There is no intermediate representation between the AST and the
//! byte stream.

use syntax::ast::{self, AssignTarget, BinaryOp, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp};

use crate::chunk::Chunk;
use crate::chunk::Opcode;
use crate::error::CompileError;
use crate::value::Value;

/// One more than the largest slot index a single-byte `GET_LOCAL`/`SET_LOCAL`
/// operand can address.
const MAX_LOCALS: usize = 256;
const MAX_JUMP: usize = u16::MAX as usize;

struct Local {
  name: String,
  depth: u32,
}

pub struct Compiler {
  chunk: Chunk,
  locals: Vec<Local>,
  scope_depth: u32,
  errors: Vec<CompileError>,
}

/// Compiles a parsed module into a chunk, appending the driver's trailing
/// `HALT`. Returns every compile error accumulated along the way rather than
/// stopping at the first, mirroring the front end's diagnostic batching.
pub fn compile(module: &ast::Module) -> Result<Chunk, Vec<CompileError>> {
  let mut c = Compiler {
    chunk: Chunk::new(),
    locals: Vec::new(),
    scope_depth: 0,
    errors: Vec::new(),
  };
  let mut last_line = 1;
  for stmt in &module.body {
    last_line = stmt.line;
    c.statement(stmt);
  }
  c.chunk.write_op(Opcode::Halt, last_line);
  if c.errors.is_empty() {
    Ok(c.chunk)
  } else {
    Err(c.errors)
  }
}

impl Compiler {
  fn error(&mut self, line: u32, message: impl Into<String>) {
    self.errors.push(CompileError {
      message: message.into(),
      line,
    });
  }

  fn emit(&mut self, op: Opcode, line: u32) {
    self.chunk.write_op(op, line);
  }

  fn emit_u8(&mut self, op: Opcode, operand: u8, line: u32) {
    self.chunk.write_op(op, line);
    self.chunk.write_u8(operand, line);
  }

  /// Adds `value` to the constant pool, erroring (and returning 0, a dummy
  /// index) if the one-byte operand budget is exhausted.
  fn constant_index(&mut self, value: Value, line: u32) -> u8 {
    let idx = self.chunk.add_constant(value);
    if idx >= crate::chunk::MAX_CONSTANTS {
      self.error(line, "Too many constants in one chunk.");
      return 0;
    }
    idx as u8
  }

  fn name_constant(&mut self, name: &str, line: u32) -> u8 {
    self.constant_index(Value::string(name), line)
  }

  /// Writes the opcode and two placeholder bytes, returning the offset of
  /// the first placeholder for later patching.
  fn emit_jump(&mut self, op: Opcode, line: u32) -> usize {
    self.chunk.write_op(op, line);
    let offset = self.chunk.len();
    self.chunk.write_u8(0, line);
    self.chunk.write_u8(0, line);
    offset
  }

  fn patch_jump(&mut self, offset: usize, line: u32) {
    let diff = self.chunk.len() - offset - 2;
    if diff > MAX_JUMP {
      self.error(line, "Jump too large.");
      return;
    }
    let bytes = (diff as u16).to_be_bytes();
    self.chunk.code[offset] = bytes[0];
    self.chunk.code[offset + 1] = bytes[1];
  }

  fn emit_loop(&mut self, loop_start: usize, line: u32) {
    // Measured before the opcode byte is written, since the VM's `next_ip`
    // (what the offset is subtracted from) already points past the opcode
    // and its two-byte operand by the time `JUMP_BACK` executes.
    let diff = self.chunk.len() - loop_start + 3;
    self.chunk.write_op(Opcode::JumpBack, line);
    if diff > MAX_JUMP {
      self.error(line, "Jump too large.");
      self.chunk.write_u8(0, line);
      self.chunk.write_u8(0, line);
      return;
    }
    self.chunk.write_u16(diff as u16, line);
  }

  fn begin_scope(&mut self) {
    self.scope_depth += 1;
  }

  fn end_scope(&mut self, line: u32) {
    self.scope_depth -= 1;
    while let Some(local) = self.locals.last() {
      if local.depth <= self.scope_depth {
        break;
      }
      self.locals.pop();
      self.emit(Opcode::Pop, line);
    }
  }

  /// Registers `name` as a new local in the current scope, returning its
  /// slot (the locals vector's index, which tracks the runtime stack
  /// position of the value already pushed for it).
  fn declare_local(&mut self, name: &str, line: u32) -> u8 {
    if self.locals.len() >= MAX_LOCALS {
      self.error(line, "Too many local variables in one scope.");
      return 0;
    }
    self.locals.push(Local {
      name: name.to_string(),
      depth: self.scope_depth,
    });
    (self.locals.len() - 1) as u8
  }

  /// Reverse scan so an inner-scope redeclaration shadows an outer one.
  fn resolve_local(&self, name: &str) -> Option<u8> {
    self
      .locals
      .iter()
      .rposition(|l| l.name == name)
      .map(|i| i as u8)
  }

  fn statement(&mut self, stmt: &Stmt) {
    let line = stmt.line;
    match &stmt.kind {
      StmtKind::Let(l) => self.let_stmt(l, line),
      StmtKind::If(i) => self.if_stmt(i, line),
      StmtKind::While(w) => self.while_stmt(w, line),
      StmtKind::ForRange(f) => self.for_range_stmt(f, line),
      StmtKind::Fn(f) => self.fn_stmt(f, line),
      StmtKind::Return(value) => {
        match value {
          Some(e) => self.expr(e),
          None => self.emit(Opcode::Nil, line),
        }
        self.emit(Opcode::Return, line);
      }
      StmtKind::Print(e) => {
        self.expr(e);
        self.emit(Opcode::Print, line);
      }
      StmtKind::Block(body) => {
        self.begin_scope();
        for s in body {
          self.statement(s);
        }
        self.end_scope(line);
      }
      StmtKind::Expr(e) => {
        self.expr(e);
        self.emit(Opcode::Pop, line);
      }
      // Reserved-but-inert: parsed fully by the front end, realized by
      // nothing here. No bytes are emitted for any of these.
      StmtKind::ForIn(_)
      | StmtKind::Class(_)
      | StmtKind::Server(_)
      | StmtKind::Import(_)
      | StmtKind::Break
      | StmtKind::Continue => {}
    }
  }

  fn let_stmt(&mut self, l: &ast::Let, line: u32) {
    match &l.init {
      Some(e) => self.expr(e),
      None => self.emit(Opcode::Nil, line),
    }
    if self.scope_depth == 0 {
      let idx = self.name_constant(&l.name, line);
      self.emit_u8(Opcode::SetGlobal, idx, line);
      self.emit(Opcode::Pop, line);
    } else {
      self.declare_local(&l.name, line);
    }
  }

  fn if_stmt(&mut self, i: &ast::If, line: u32) {
    self.expr(&i.cond);
    let false_jump = self.emit_jump(Opcode::JumpIfFalse, line);
    self.emit(Opcode::Pop, line);
    self.block(&i.then_branch, line);
    if let Some(else_branch) = &i.else_branch {
      let end_jump = self.emit_jump(Opcode::Jump, line);
      self.patch_jump(false_jump, line);
      self.emit(Opcode::Pop, line);
      self.block(else_branch, line);
      self.patch_jump(end_jump, line);
    } else {
      self.patch_jump(false_jump, line);
      self.emit(Opcode::Pop, line);
    }
  }

  fn while_stmt(&mut self, w: &ast::While, line: u32) {
    let loop_start = self.chunk.len();
    self.expr(&w.cond);
    let false_jump = self.emit_jump(Opcode::JumpIfFalse, line);
    self.emit(Opcode::Pop, line);
    self.block(&w.body, line);
    self.emit_loop(loop_start, line);
    self.patch_jump(false_jump, line);
    self.emit(Opcode::Pop, line);
  }

  fn for_range_stmt(&mut self, f: &ast::ForRange, line: u32) {
    self.begin_scope();
    self.expr(&f.start);
    let slot = self.declare_local(&f.var, line);
    let loop_start = self.chunk.len();
    self.emit_u8(Opcode::GetLocal, slot, line);
    self.expr(&f.end);
    self.emit(Opcode::Less, line);
    let false_jump = self.emit_jump(Opcode::JumpIfFalse, line);
    self.emit(Opcode::Pop, line);
    self.block(&f.body, line);
    self.emit_u8(Opcode::GetLocal, slot, line);
    let one = self.constant_index(Value::Int(1), line);
    self.emit_u8(Opcode::Constant, one, line);
    self.emit(Opcode::Add, line);
    self.emit_u8(Opcode::SetLocal, slot, line);
    self.emit(Opcode::Pop, line);
    self.emit_loop(loop_start, line);
    self.patch_jump(false_jump, line);
    self.emit(Opcode::Pop, line);
    self.end_scope(line);
  }

  fn fn_stmt(&mut self, f: &ast::Fn, line: u32) {
    self.emit(Opcode::Nil, line);
    if self.scope_depth == 0 {
      let idx = self.name_constant(&f.name, line);
      self.emit_u8(Opcode::SetGlobal, idx, line);
      self.emit(Opcode::Pop, line);
    } else {
      self.declare_local(&f.name, line);
    }
  }

  fn block(&mut self, body: &[Stmt], line: u32) {
    self.begin_scope();
    for s in body {
      self.statement(s);
    }
    self.end_scope(line);
  }

  fn expr(&mut self, e: &Expr) {
    let line = e.line;
    match &e.kind {
      ExprKind::Literal(lit) => self.literal(lit, line),
      ExprKind::Ident(name) => match self.resolve_local(name) {
        Some(slot) => self.emit_u8(Opcode::GetLocal, slot, line),
        None => {
          let idx = self.name_constant(name, line);
          self.emit_u8(Opcode::GetGlobal, idx, line);
        }
      },
      ExprKind::Unary(op, operand) => {
        self.expr(operand);
        self.emit(
          match op {
            UnaryOp::Neg => Opcode::Negate,
            UnaryOp::Not => Opcode::Not,
          },
          line,
        );
      }
      ExprKind::Binary(op, lhs, rhs) => {
        self.expr(lhs);
        self.expr(rhs);
        self.emit(binary_opcode(*op), line);
      }
      ExprKind::Call(callee, args) => {
        self.expr(callee);
        for a in args {
          self.expr(a);
        }
        if args.len() > u8::MAX as usize {
          self.error(line, "Too many arguments in call.");
        }
        self.emit_u8(Opcode::Call, args.len() as u8, line);
      }
      ExprKind::Field(obj, name) => {
        self.expr(obj);
        let idx = self.name_constant(name, line);
        self.emit_u8(Opcode::GetField, idx, line);
      }
      ExprKind::Index(obj, index) => {
        self.expr(obj);
        self.expr(index);
        self.emit(Opcode::GetIndex, line);
      }
      ExprKind::Array(elements) => {
        for el in elements {
          self.expr(el);
        }
        if elements.len() > u8::MAX as usize {
          self.error(line, "Too many elements in array literal.");
        }
        self.emit_u8(Opcode::Array, elements.len() as u8, line);
      }
      ExprKind::Map(_) => {
        // Reserved map-literal syntax: not realized, but an expression must
        // still leave exactly one value behind.
        self.emit(Opcode::Nil, line);
      }
      ExprKind::Assign(target, value) => {
        self.expr(value);
        match target.as_ref() {
          AssignTarget::Ident(name) => match self.resolve_local(name) {
            Some(slot) => self.emit_u8(Opcode::SetLocal, slot, line),
            None => {
              let idx = self.name_constant(name, line);
              self.emit_u8(Opcode::SetGlobal, idx, line);
            }
          },
          AssignTarget::Field(obj, name) => {
            self.expr(obj);
            let idx = self.name_constant(name, line);
            self.emit_u8(Opcode::SetField, idx, line);
          }
          AssignTarget::Index(obj, index) => {
            self.expr(obj);
            self.expr(index);
            self.emit(Opcode::SetIndex, line);
          }
        }
      }
    }
  }

  fn literal(&mut self, lit: &Literal, line: u32) {
    match lit {
      Literal::Int(i) => {
        let idx = self.constant_index(Value::Int(*i), line);
        self.emit_u8(Opcode::Constant, idx, line);
      }
      Literal::Float(x) => {
        let idx = self.constant_index(Value::Float(*x), line);
        self.emit_u8(Opcode::Constant, idx, line);
      }
      Literal::String(s) => {
        let idx = self.constant_index(Value::string(s.as_ref()), line);
        self.emit_u8(Opcode::Constant, idx, line);
      }
      Literal::Bool(true) => self.emit(Opcode::True, line),
      Literal::Bool(false) => self.emit(Opcode::False, line),
      Literal::Nil => self.emit(Opcode::Nil, line),
    }
  }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
  match op {
    BinaryOp::Add => Opcode::Add,
    BinaryOp::Sub => Opcode::Sub,
    BinaryOp::Mul => Opcode::Mul,
    BinaryOp::Div => Opcode::Div,
    BinaryOp::Mod => Opcode::Mod,
    BinaryOp::Eq => Opcode::Equal,
    BinaryOp::Ne => Opcode::NotEqual,
    BinaryOp::Lt => Opcode::Less,
    BinaryOp::Le => Opcode::LessEqual,
    BinaryOp::Gt => Opcode::Greater,
    BinaryOp::Ge => Opcode::GreaterEqual,
    BinaryOp::And => Opcode::And,
    BinaryOp::Or => Opcode::Or,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn compile_src(src: &str) -> Chunk {
    let module = syntax::parse(src).expect("parses");
    compile(&module).expect("compiles")
  }

  #[test]
  fn literal_addition_emits_two_constants_and_add() {
    let chunk = compile_src("print(2 + 3)");
    let text = chunk.disassemble().to_string();
    assert!(text.contains("Constant 0 ; 2"));
    assert!(text.contains("Constant 1 ; 3"));
    assert!(text.contains("Add"));
    assert!(text.contains("Print"));
    assert!(text.ends_with("Halt\n"));
  }

  #[test]
  fn let_at_top_level_sets_global_and_pops() {
    let chunk = compile_src("let x = 1;");
    let text = chunk.disassemble().to_string();
    assert!(text.contains("SetGlobal 0 ; x"));
    assert!(text.contains("Pop"));
  }

  #[test]
  fn let_inside_block_keeps_value_as_local_slot() {
    let chunk = compile_src("{ let x = 1; print(x); }");
    let text = chunk.disassemble().to_string();
    assert!(!text.contains("SetGlobal"));
    assert!(text.contains("GetLocal 0"));
    // the block closes its scope with a POP for the local.
    assert_eq!(text.matches("Pop").count(), 1);
  }

  #[test]
  fn if_without_else_patches_single_jump() {
    let chunk = compile_src("if 1 { print(1); }");
    let text = chunk.disassemble().to_string();
    assert!(text.contains("JumpIfFalse"));
  }

  #[test]
  fn for_range_emits_loop_back_edge() {
    let chunk = compile_src("for i in 0..5 { print(i); }");
    let text = chunk.disassemble().to_string();
    assert!(text.contains("JumpBack"));
    assert!(text.contains("Less"));
  }

  #[test]
  fn while_loop_back_edge_targets_the_condition_not_one_byte_early() {
    let chunk = compile_src("let i = 0; while i < 3 { i = i + 1; }");
    // `loop_start` is recorded right after the preceding `let`'s SET_GLOBAL
    // + POP, i.e. at the offset of the condition's first GET_GLOBAL.
    let mut offset = 0;
    let cond_start = loop {
      let instr = crate::chunk::read_instruction(&chunk, offset).expect("a GetGlobal for `i`");
      if instr.opcode == Opcode::GetGlobal {
        break instr.offset;
      }
      offset = instr.next_offset;
    };
    let text = chunk.disassemble().to_string();
    let jump_line = text
      .lines()
      .find(|l| l.contains("JumpBack"))
      .expect("a JumpBack instruction");
    assert!(
      jump_line.contains(&format!("-> {cond_start:04}")),
      "expected JumpBack to target {cond_start:04}, got: {jump_line}"
    );
  }

  #[test]
  fn reserved_constructs_emit_nothing() {
    let before = compile_src("let x = 1;");
    let after = compile_src("let x = 1; import foo; class C { } server S { }");
    assert_eq!(before.code, after.code);
  }

  #[test]
  fn too_many_constants_is_a_compile_error() {
    let mut src = String::new();
    for i in 0..300 {
      src.push_str(&format!("let v{i} = {i};\n"));
    }
    let module = syntax::parse(&src).expect("parses");
    let err = compile(&module).unwrap_err();
    assert!(err.iter().any(|e| e.message.contains("Too many constants")));
  }
}
