//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and emits instructions while it
//!   recognises each rule – parsing *is* compiling, there is no second pass
//!   and no syntax tree.
//! - `codegen` owns the instruction model and the patchable code buffer the
//!   parser emits into.
//! - `symbol` assigns storage slots to declared variables.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod symbol;
pub mod tokenizer;

pub use codegen::{Comparison, Instruction, Listing};
pub use error::{CompileError, CompileResult};

/// Compile a source string into a stack-machine instruction listing.
pub fn compile(source: &str) -> CompileResult<Listing> {
  let tokens = tokenizer::tokenize(source)?;
  parser::parse(tokens, source)
}
