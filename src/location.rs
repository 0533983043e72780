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

use crate::assembler::symbols::Symbol;

/// Position of a piece of source text, as a zero-based line index.
///
/// Diagnostics reference line indices rather than character buffers, so the
/// source text does not need to outlive the errors produced from it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
}

impl Location {
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

/// A single source lexeme. Whether a token is a mnemonic, register, immediate
/// or symbol is decided by context, not by the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub value: String,
    /// Relocation hint attached during tokenization, e.g. `%pcrel_hi`.
    pub relocation: Option<String>,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            relocation: None,
        }
    }

    pub fn with_relocation(value: impl Into<String>, relocation: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            relocation: Some(relocation.into()),
        }
    }
}

/// One tokenized source line: the symbols defined on it, an optional
/// directive, and the remaining tokens (mnemonic first, then operands).
#[derive(Debug, Clone, Default)]
pub struct TokenizedLine {
    pub location: Location,
    pub symbols: Vec<Symbol>,
    pub directive: Option<String>,
    pub tokens: Vec<Token>,
}

impl TokenizedLine {
    pub fn new(line: usize) -> Self {
        Self {
            location: Location::new(line),
            ..Self::default()
        }
    }
}
