//! The four error classes from the pipeline: lex errors are always folded
//! into parse diagnostics (a lex error surfaces as an `Error` token, which
//! the parser treats as a parse error at that position), so callers see
//! three variants. Nothing here is ever thrown as a panic; the caller
//! decides what to do with a `Result::Err`.

use std::fmt;

use diag::{Report, Source};
use span::Span;

#[derive(Debug)]
pub enum Error {
  /// Lex and parse errors: the front end accumulates every diagnostic from
  /// one pass rather than stopping at the first (spec.md §4.2's one
  /// diagnostic per panic window, possibly several windows per program).
  Parse(Vec<syntax::Error>),
  Compile(Vec<CompileError>),
  Runtime(RuntimeError),
}

#[derive(Debug, Clone)]
pub struct CompileError {
  pub message: String,
  pub line: u32,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
  pub message: String,
  pub line: u32,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Parse(errs) => {
        for (i, e) in errs.iter().enumerate() {
          if i > 0 {
            writeln!(f)?;
          }
          write!(f, "parse error: {}", e.message)?;
        }
        Ok(())
      }
      Error::Compile(errs) => {
        for (i, e) in errs.iter().enumerate() {
          if i > 0 {
            writeln!(f)?;
          }
          write!(f, "compile error: line {}: {}", e.line, e.message)?;
        }
        Ok(())
      }
      Error::Runtime(e) => write!(f, "runtime error: line {}: {}", e.line, e.message),
    }
  }
}

impl std::error::Error for Error {}

impl Error {
  /// Renders every diagnostic this error carries, attributing each one to
  /// its source line with a caret, the way the driver's CLI prints errors.
  pub fn report(&self, source: &str, color: bool) -> String {
    let mut out = String::new();
    match self {
      Error::Parse(errs) => {
        for e in errs {
          out.push_str(&render(source, "parse", &e.message, e.span, color));
          out.push('\n');
        }
      }
      Error::Compile(errs) => {
        for e in errs {
          out.push_str(&render(
            source,
            "compile",
            &e.message,
            line_span(source, e.line),
            color,
          ));
          out.push('\n');
        }
      }
      Error::Runtime(e) => {
        out.push_str(&render(
          source,
          "runtime",
          &e.message,
          line_span(source, e.line),
          color,
        ));
        out.push('\n');
      }
    }
    out
  }
}

fn render(source: &str, phase: &str, message: &str, span: Span, color: bool) -> String {
  Report::error()
    .source(Source::string(source))
    .message(message.to_string())
    .span(span)
    .label(phase.to_string())
    .color(color)
    .build()
    .emit_to_string()
    .unwrap_or_else(|_| format!("{phase}: {message}"))
}

/// Finds the byte span of 1-indexed `line` within `source`, for errors that
/// only know a line number (compile/runtime), not a byte offset.
fn line_span(source: &str, line: u32) -> Span {
  let mut start = 0;
  let mut current_line = 1;
  for (i, b) in source.bytes().enumerate() {
    if current_line == line {
      start = i;
      break;
    }
    if b == b'\n' {
      current_line += 1;
    }
  }
  if current_line < line {
    start = source.len();
  }
  let end = source[start..]
    .find('\n')
    .map(|i| start + i)
    .unwrap_or(source.len());
  Span::from(start..end.max(start))
}

impl From<Vec<syntax::Error>> for Error {
  fn from(errs: Vec<syntax::Error>) -> Self {
    Error::Parse(errs)
  }
}
