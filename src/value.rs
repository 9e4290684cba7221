//! The value model: a tagged union over the primitive types the VM operates
//! on, plus the handful of tags (`function`, `class`, `instance`, `map`)
//! that are reserved by the language surface but never constructed by this
//! compiler (see the crate's design notes on unrealized user functions).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String>;

#[derive(Clone)]
pub enum Value {
  Nil,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(Rc<str>),
  Array(Rc<RefCell<Vec<Value>>>),
  Native(Rc<NativeFn>),
  /// Reserved: a conforming fn-declaration never produces one (see
  /// `compiler::Compiler::fn_decl`); kept so the tag set matches spec.md §3.
  Function,
  Class,
  Instance,
  Map,
}

impl Value {
  pub fn string(s: impl Into<String>) -> Value {
    Value::Str(Rc::from(s.into()))
  }

  pub fn array(values: Vec<Value>) -> Value {
    Value::Array(Rc::new(RefCell::new(values)))
  }

  /// Any value other than `nil`, `false`, or integer `0` is truthy.
  pub fn is_truthy(&self) -> bool {
    !matches!(self, Value::Nil | Value::Bool(false) | Value::Int(0))
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Nil => "nil",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::Str(_) => "string",
      Value::Array(_) => "array",
      Value::Native(_) => "native",
      Value::Function => "function",
      Value::Class => "class",
      Value::Instance => "instance",
      Value::Map => "map",
    }
  }

  /// `len(v)`: string byte length, array length, otherwise 0.
  pub fn len(&self) -> i64 {
    match self {
      Value::Str(s) => s.len() as i64,
      Value::Array(a) => a.borrow().len() as i64,
      _ => 0,
    }
  }

  pub fn is_number(&self) -> bool {
    matches!(self, Value::Int(_) | Value::Float(_))
  }

  /// Widens `Int`/`Float` to `f64` for mixed-type arithmetic and comparison
  /// (spec.md §4.4: an `Int`/`Float` operation promotes to `Float`).
  pub fn as_f64(&self) -> f64 {
    match self {
      Value::Int(i) => *i as f64,
      Value::Float(f) => *f,
      _ => 0.0,
    }
  }
}

/// Structural equality: primitive variants compare by value, strings by
/// content; every other combination (including across distinct tags, and
/// deliberately across `Int`/`Float`) is false.
impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Nil, Value::Nil) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Float(a), Value::Float(b)) => a == b,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
      (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
      (Value::Function, Value::Function) => true,
      (Value::Class, Value::Class) => true,
      (Value::Instance, Value::Instance) => true,
      (Value::Map, Value::Map) => true,
      _ => false,
    }
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{self}")
  }
}

/// Canonical rendering used by `PRINT`, `print`, and `str`. Floats use
/// Rust's own shortest round-tripping formatting, which satisfies the
/// "shortest lossless" contract without a dedicated formatting crate.
impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Nil => write!(f, "nil"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Int(i) => write!(f, "{i}"),
      Value::Float(x) => write!(f, "{x}"),
      Value::Str(s) => write!(f, "{s}"),
      Value::Array(_) => write!(f, "[array]"),
      Value::Native(_) => write!(f, "<native>"),
      Value::Function => write!(f, "<fn>"),
      Value::Class => write!(f, "<class>"),
      Value::Instance => write!(f, "<instance>"),
      Value::Map => write!(f, "{{map}}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cross_tag_equality_is_false() {
    assert_ne!(Value::Int(0), Value::Float(0.0));
    assert_ne!(Value::Int(1), Value::Bool(true));
    assert_ne!(Value::Nil, Value::Bool(false));
  }

  #[test]
  fn string_equality_is_by_content() {
    assert_eq!(Value::string("hi"), Value::string("hi"));
    assert_ne!(Value::string("hi"), Value::string("bye"));
  }

  #[test]
  fn truthiness_matches_glossary() {
    assert!(!Value::Nil.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::Int(0).is_truthy());
    assert!(Value::Int(-1).is_truthy());
    assert!(Value::Bool(true).is_truthy());
    assert!(Value::string("").is_truthy());
  }

  #[test]
  fn len_matches_testable_properties() {
    assert_eq!(Value::string("").len(), 0);
    assert_eq!(Value::array(vec![]).len(), 0);
    assert_eq!(Value::array(vec![Value::Int(1), Value::Int(2)]).len(), 2);
  }

  #[test]
  fn float_renders_shortest_lossless() {
    assert_eq!(Value::Float(0.1).to_string(), "0.1");
    assert_eq!(Value::Float(10.0).to_string(), "10");
  }
}
