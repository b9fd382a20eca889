//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond classifying keywords, single-character identifiers, unsigned
//! integer literals and the punctuator set. The two-character `!=` is
//! matched before single-character punctuators to avoid ambiguity.

use phf::phf_map;

use crate::error::{CompileError, CompileResult};

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
  "int" => TokenKind::Int,
  "if" => TokenKind::If,
  "else" => TokenKind::Else,
  "while" => TokenKind::While,
  "end" => TokenKind::End,
};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Num,
  Ident,
  Int,
  If,
  Else,
  While,
  End,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i32>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i32>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i32>()
        .map_err(|err| CompileError::at(input, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    if c.is_ascii_alphabetic() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
      }
      let text = &input[start..i];
      if let Some(kind) = KEYWORDS.get(text) {
        tokens.push(Token::new(*kind, start, text.len(), None));
      } else if text.len() == 1 {
        tokens.push(Token::new(TokenKind::Ident, start, 1, None));
      } else {
        return Err(CompileError::at(
          input,
          start,
          format!("identifiers are single characters, but got \"{text}\""),
        ));
      }
      continue;
    }

    if input[i..].starts_with("!=") {
      tokens.push(Token::new(TokenKind::Punctuator, i, 2, None));
      i += 2;
      continue;
    }

    if matches!(
      c,
      b'+' | b'-' | b'*' | b'/' | b'(' | b')' | b'{' | b'}' | b',' | b';' | b'=' | b'<' | b'>'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keywords_are_classified() {
    let tokens = tokenize("while x end").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
      kinds,
      vec![
        TokenKind::While,
        TokenKind::Ident,
        TokenKind::End,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn not_equal_is_one_token() {
    let tokens = tokenize("x != y").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::Punctuator);
    assert_eq!(token_text(&tokens[1], "x != y"), "!=");
  }

  #[test]
  fn numbers_carry_their_value() {
    let tokens = tokenize("132").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Num);
    assert_eq!(tokens[0].value, Some(132));
  }

  #[test]
  fn long_identifiers_are_rejected() {
    assert!(tokenize("foo = 1 ;").is_err());
  }
}
