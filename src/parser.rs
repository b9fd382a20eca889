//! Recursive-descent recogniser fused with code emission.
//!
//! The parser mirrors the classic single-pass structure: one function per
//! grammar rule, each consuming tokens through a shared cursor and emitting
//! stack-machine instructions as a side effect of recognising its rule. No
//! syntax tree is built; jumps whose targets are unknown while the rule is
//! still being recognised are reserved in the code buffer and patched once
//! the surrounding construct completes.

use crate::codegen::{CodeBuffer, Comparison, Instruction, Listing};
use crate::error::{CompileError, CompileResult};
use crate::symbol::SymbolTable;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Relational operator as written in the source. The conditional/loop rules
/// translate it into a branch opcode; the relational-expression rule itself
/// emits no comparison.
#[derive(Debug, Clone, Copy)]
enum RelOp {
  Lt,
  Gt,
  Eq,
  Ne,
}

impl RelOp {
  /// Comparison for the "skip the true branch" jump: the branch is taken
  /// exactly when the written condition is false.
  fn negated(self) -> Comparison {
    match self {
      RelOp::Gt => Comparison::Le,
      RelOp::Lt => Comparison::Ge,
      RelOp::Eq => Comparison::Ne,
      RelOp::Ne => Comparison::Eq,
    }
  }
}

/// Compile a token stream into a finalized instruction listing.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Listing> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::at(source, 0, "program is empty"));
  }

  let mut code = CodeBuffer::new();
  let mut symbols = SymbolTable::new();
  parse_program(&mut stream, &mut code, &mut symbols)?;
  Ok(code.finalize())
}

/// program -> decls stmts end
fn parse_program(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  parse_decls(stream, symbols)?;
  parse_stmts(stream, code, symbols)?;

  if !stream.consume(TokenKind::End) {
    return Err(stream.unexpected("\"end\""));
  }
  code.emit(Instruction::Return);

  if !stream.is_eof() {
    return Err(stream.unexpected("EOF"));
  }
  Ok(())
}

/// decls -> int idlist ;
fn parse_decls(stream: &mut TokenStream, symbols: &mut SymbolTable) -> CompileResult<()> {
  if stream.consume(TokenKind::Int) {
    parse_idlist(stream, symbols)?;
    stream.skip(";")?;
  }
  Ok(())
}

/// idlist -> id { , id }
fn parse_idlist(stream: &mut TokenStream, symbols: &mut SymbolTable) -> CompileResult<()> {
  let (name, _) = stream.get_ident()?;
  symbols.declare(name);

  while stream.equal(",") {
    let (name, _) = stream.get_ident()?;
    symbols.declare(name);
  }
  Ok(())
}

/// stmts -> stmt [ stmts ]
///
/// The list runs until the enclosing construct closes: `}` for a compound
/// statement, `end` for the program.
fn parse_stmts(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  loop {
    parse_stmt(stream, code, symbols)?;

    let ends_list = stream.is_eof()
      || stream.at("}")
      || matches!(stream.peek().map(|token| token.kind), Some(TokenKind::End));
    if ends_list {
      return Ok(());
    }
  }
}

/// stmt -> assign | cond | loop
fn parse_stmt(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  if stream.consume(TokenKind::If) {
    parse_cond(stream, code, symbols)
  } else if stream.consume(TokenKind::While) {
    parse_loop(stream, code, symbols)
  } else if matches!(
    stream.peek().map(|token| token.kind),
    Some(TokenKind::Ident)
  ) {
    parse_assign(stream, code, symbols)
  } else {
    Err(stream.unexpected("a statement"))
  }
}

/// assign -> id = expr ;
fn parse_assign(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  let (name, _) = stream.get_ident()?;
  // Resolve the target up front; an undeclared name must fail before any
  // of the right-hand side reaches the buffer.
  let slot = symbols.resolve(name)?;

  stream.skip("=")?;
  parse_expr(stream, code, symbols)?;
  stream.skip(";")?;

  // The store goes after the expression's code, so at run time it pops the
  // expression's result.
  code.emit(Instruction::Store(slot));
  Ok(())
}

/// cond -> if '(' rexp ')' cmpdstmt [ else cmpdstmt ]
fn parse_cond(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  stream.skip("(")?;
  let (op, _) = parse_rexp(stream, code, symbols)?;
  stream.skip(")")?;

  // The true branch falls through; this jump skips it when the condition
  // is false.
  let skip_true = code.reserve_branch(op.negated());
  parse_cmpdstmt(stream, code, symbols)?;

  if stream.consume(TokenKind::Else) {
    let skip_else = code.reserve_goto();
    code.patch(skip_true, code.position());
    parse_cmpdstmt(stream, code, symbols)?;
    code.patch(skip_else, code.position());
  } else {
    code.patch(skip_true, code.position());
  }
  Ok(())
}

/// loop -> while '(' rexp ')' cmpdstmt
fn parse_loop(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  stream.skip("(")?;
  let (op, operand_units) = parse_rexp(stream, code, symbols)?;
  stream.skip(")")?;

  let exit = code.reserve_branch(op.negated());
  // The back-jump lands on the first instruction that reloads the
  // condition's operands: operand_units before the exit branch itself, not
  // the raw position where the loop began in the source.
  let retest = exit.address() - operand_units;

  parse_cmpdstmt(stream, code, symbols)?;
  code.emit(Instruction::Goto(Some(retest)));
  code.patch(exit, code.position());
  Ok(())
}

/// cmpdstmt -> '{' stmts '}'
fn parse_cmpdstmt(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  stream.skip("{")?;
  parse_stmts(stream, code, symbols)?;
  stream.skip("}")
}

/// rexp -> expr (< | > | = | !=) expr
///
/// Returns the written operator together with the number of address units
/// the two operand expressions emitted; the loop rule needs the count to
/// aim its backward jump at the operand reloads.
fn parse_rexp(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<(RelOp, usize)> {
  let start = code.position();
  parse_expr(stream, code, symbols)?;

  let op = if stream.equal("<") {
    RelOp::Lt
  } else if stream.equal(">") {
    RelOp::Gt
  } else if stream.equal("!=") {
    RelOp::Ne
  } else if stream.equal("=") {
    RelOp::Eq
  } else {
    return Err(stream.unexpected("a relational operator"));
  };

  parse_expr(stream, code, symbols)?;
  Ok((op, code.position() - start))
}

/// expr -> term [ (+ | -) expr ]
///
/// Right-associative by construction: the tail is itself an expression.
/// The operator is emitted after both operand subtrees.
fn parse_expr(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  parse_term(stream, code, symbols)?;

  if stream.equal("+") {
    parse_expr(stream, code, symbols)?;
    code.emit(Instruction::Add);
  } else if stream.equal("-") {
    parse_expr(stream, code, symbols)?;
    code.emit(Instruction::Sub);
  }
  Ok(())
}

/// term -> factor [ (* | /) term ]
fn parse_term(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  parse_factor(stream, code, symbols)?;

  if stream.equal("*") {
    parse_term(stream, code, symbols)?;
    code.emit(Instruction::Mul);
  } else if stream.equal("/") {
    parse_term(stream, code, symbols)?;
    code.emit(Instruction::Div);
  }
  Ok(())
}

/// factor -> int_lit | id | '(' expr ')'
fn parse_factor(
  stream: &mut TokenStream,
  code: &mut CodeBuffer,
  symbols: &mut SymbolTable,
) -> CompileResult<()> {
  if stream.equal("(") {
    parse_expr(stream, code, symbols)?;
    stream.skip(")")?;
    return Ok(());
  }

  if matches!(
    stream.peek().map(|token| token.kind),
    Some(TokenKind::Ident)
  ) {
    let (name, _) = stream.get_ident()?;
    let slot = symbols.resolve(name)?;
    code.emit(Instruction::Load(slot));
    return Ok(());
  }

  let (value, _) = stream.get_number()?;
  code.push_constant(value);
  Ok(())
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// True if the current token is the given punctuator, without consuming it.
  fn at(&self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      return true;
    }
    false
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.at(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it has the given kind. Used for keywords.
  fn consume(&mut self, kind: TokenKind) -> bool {
    if let Some(token) = self.peek()
      && token.kind == kind
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("\"{s}\"")))
    }
  }

  /// Diagnostic for a token the grammar does not allow here.
  fn unexpected(&self, wanted: &str) -> CompileError {
    let (loc, got) = match self.tokens.get(self.pos) {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    };
    CompileError::at(
      self.source,
      loc,
      format!("expected {wanted}, but got \"{got}\""),
    )
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i32, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    Err(self.unexpected("a number"))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(char, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let Some(name) = token_text(token, self.source).chars().next() else {
        return Err(CompileError::at(
          self.source,
          token.loc,
          "identifier is missing characters",
        ));
      };
      let loc = token.loc;
      self.pos += 1;
      return Ok((name, loc));
    }

    Err(self.unexpected("an identifier"))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
