//! Front door: parse, compile, and run. `Hebi::builder()` mirrors the
//! source's builder — an instance owns its own output sink and native
//! registry. Unlike the source, `Hebi` is not `Send`: a registered native
//! closure can capture arbitrary non-`Send` state, so there is no sound
//! blanket impl to provide here.

mod chunk;
mod compiler;
mod error;
mod table;
mod value;
mod vm;

use std::cell::RefCell;
use std::rc::Rc;

pub use error::Error;
pub use value::Value;
pub use vm::{Config, Stdout};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub struct Hebi {
  stdout: Rc<RefCell<Box<dyn Stdout>>>,
  config: Config,
  builtins: Vec<(String, Rc<value::NativeFn>)>,
}

impl Hebi {
  pub fn builder() -> HebiBuilder {
    HebiBuilder {
      stdout: None,
      config: Config::default(),
      natives: Vec::new(),
    }
  }

  /// Parses `src` without compiling or running it; used by the CLI's
  /// `check` subcommand.
  pub fn check(&self, src: &str) -> Result<()> {
    syntax::parse(src).map(|_| ()).map_err(Error::from)
  }

  /// Parses, compiles, and produces the disassembly text for `src`,
  /// without executing it.
  pub fn disassemble(&self, src: &str) -> Result<String> {
    let module = syntax::parse(src)?;
    let chunk = compiler::compile(&module).map_err(Error::Compile)?;
    Ok(chunk.disassemble().to_string())
  }

  /// Parses, compiles, and runs `src` to completion against a fresh VM
  /// instance seeded with this `Hebi`'s registered natives. Each call gets
  /// its own `Vm` (globals do not persist between calls), but all calls
  /// share one output sink.
  pub fn run(&self, src: &str) -> Result<()> {
    let module = syntax::parse(src)?;
    let chunk = compiler::compile(&module).map_err(Error::Compile)?;
    let mut vm = vm::Vm::with_shared_stdout(chunk, self.stdout.clone(), self.config);
    for (name, f) in &self.builtins {
      vm.register_native_rc(name, f.clone());
    }
    vm.run().map_err(Error::Runtime)
  }
}

pub struct HebiBuilder {
  stdout: Option<Box<dyn Stdout>>,
  config: Config,
  natives: Vec<(String, Rc<value::NativeFn>)>,
}

impl HebiBuilder {
  pub fn with_io<T: Stdout + 'static>(mut self, stdout: T) -> Self {
    self.stdout = Some(Box::new(stdout));
    self
  }

  pub fn with_trace(mut self, trace: bool) -> Self {
    self.config.trace = trace;
    self
  }

  pub fn with_native(
    mut self,
    name: impl Into<String>,
    f: impl Fn(&[Value]) -> std::result::Result<Value, String> + 'static,
  ) -> Self {
    self.natives.push((name.into(), Rc::new(f)));
    self
  }

  pub fn build(self) -> Hebi {
    let stdout = self.stdout.unwrap_or_else(|| Box::new(std::io::stdout()));
    Hebi {
      stdout: Rc::new(RefCell::new(stdout)),
      config: self.config,
      builtins: self.natives,
    }
  }
}

impl Default for Hebi {
  fn default() -> Self {
    Self::builder().build()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Clone, Default)]
  struct Buf(std::rc::Rc<RefCell<Vec<u8>>>);

  impl std::io::Write for Buf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
      self.0.borrow_mut().extend_from_slice(data);
      Ok(data.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn run_writes_to_the_configured_sink() {
    let buf = Buf::default();
    let hebi = Hebi::builder().with_io(buf.clone()).build();
    hebi.run("print(2 + 3)").expect("runs");
    assert_eq!(String::from_utf8(buf.0.borrow().clone()).unwrap(), "5\n");
  }

  #[test]
  fn check_reports_parse_errors_without_running() {
    let hebi = Hebi::default();
    assert!(hebi.check("let").is_err());
    assert!(hebi.check("let x = 1;").is_ok());
  }

  #[test]
  fn disassemble_does_not_execute() {
    let buf = Buf::default();
    let hebi = Hebi::builder().with_io(buf.clone()).build();
    let text = hebi.disassemble("print(1)").expect("disassembles");
    assert!(text.contains("Print"));
    assert!(buf.0.borrow().is_empty());
  }

  #[test]
  fn registered_natives_are_callable_from_source() {
    let buf = Buf::default();
    let hebi = Hebi::builder()
      .with_io(buf.clone())
      .with_native("double", |args| match args.first() {
        Some(Value::Int(i)) => Ok(Value::Int(i * 2)),
        _ => Err("double expects an int".to_string()),
      })
      .build();
    hebi.run("print(double(21))").expect("runs");
    assert_eq!(String::from_utf8(buf.0.borrow().clone()).unwrap(), "42\n");
  }
}
