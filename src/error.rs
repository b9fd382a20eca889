//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – syntax problems are
//! formatted with a caret pointing at the offending byte, and the single
//! semantic condition the engine guards (an undeclared identifier) gets its
//! own variant so callers can tell it apart.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("undeclared identifier '{name}'"))]
  UndeclaredIdentifier { name: char },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let expr_line = format!("'{source}'");
    let safe_loc = loc.min(source.len());
    let char_offset = source[..safe_loc].chars().count() + 1; // account for opening quote
    let marker = format!("{}^", " ".repeat(char_offset));
    Self::WithLocation {
      expr_line,
      marker,
      message: message.into(),
    }
  }
}
