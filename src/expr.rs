/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Arithmetic over symbols and integer literals, used when resolving link
//! requests: `+ - * /` with parentheses and unary minus.

use crate::assembler::symbols::SymbolMap;
use crate::numeric::parse_immediate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    UnknownSymbol(String),
    Malformed(String),
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    Number(i64),
    Symbol(String),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn lex(expression: &str) -> Result<Vec<ExprToken>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = expression.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' => i += 1,
            b'+' => {
                tokens.push(ExprToken::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(ExprToken::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(ExprToken::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(ExprToken::Slash);
                i += 1;
            }
            b'(' => {
                tokens.push(ExprToken::Open);
                i += 1;
            }
            b')' => {
                tokens.push(ExprToken::Close);
                i += 1;
            }
            _ if b.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let literal = &expression[start..i];
                let value = parse_immediate(literal)
                    .ok_or_else(|| ExprError::Malformed(format!("bad literal '{literal}'")))?;
                tokens.push(ExprToken::Number(value));
            }
            _ if b.is_ascii_alphabetic() || b == b'_' || b == b'.' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push(ExprToken::Symbol(expression[start..i].to_string()));
            }
            _ => {
                return Err(ExprError::Malformed(format!(
                    "unexpected character '{}'",
                    b as char
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<ExprToken>,
    pos: usize,
    symbols: &'a SymbolMap,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<i64, ExprError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                ExprToken::Plus => {
                    self.next();
                    value = value.wrapping_add(self.term()?);
                }
                ExprToken::Minus => {
                    self.next();
                    value = value.wrapping_sub(self.term()?);
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<i64, ExprError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                ExprToken::Star => {
                    self.next();
                    value = value.wrapping_mul(self.factor()?);
                }
                ExprToken::Slash => {
                    self.next();
                    let divisor = self.factor()?;
                    if divisor == 0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    value = value.wrapping_div(divisor);
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<i64, ExprError> {
        match self.next() {
            Some(ExprToken::Minus) => Ok(self.factor()?.wrapping_neg()),
            Some(ExprToken::Number(v)) => Ok(v),
            Some(ExprToken::Symbol(name)) => self
                .symbols
                .get(&name)
                .map(|v| v as i64)
                .ok_or(ExprError::UnknownSymbol(name)),
            Some(ExprToken::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(ExprToken::Close) => Ok(value),
                    _ => Err(ExprError::Malformed("missing ')'".to_string())),
                }
            }
            other => Err(ExprError::Malformed(format!(
                "expected a value, found {other:?}"
            ))),
        }
    }
}

/// Evaluates `expression` against the symbol map. Plain literals and bare
/// symbols are just degenerate expressions.
pub fn evaluate(expression: &str, symbols: &SymbolMap) -> Result<i64, ExprError> {
    let tokens = lex(expression)?;
    if tokens.is_empty() {
        return Err(ExprError::Malformed("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        symbols,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Malformed("trailing input".to_string()));
    }
    Ok(value)
}
