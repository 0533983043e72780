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

//! Pseudo-instructions: mnemonics the assembler rewrites into one or more
//! real instruction lines during pass 1.

use crate::assembler::symbols::SymbolMap;
use crate::errors::AssemblyError;
use crate::isa::Isa;
use crate::isa::instruction::strip_parens;
use crate::location::{Token, TokenizedLine};
use crate::numeric::parse_immediate;

/// Operand shape expected by a pseudo-instruction. `Reg` must resolve as a
/// register name; `Imm` accepts any other token (literal, symbol or
/// expression).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PseudoTokenKind {
    Reg,
    Imm,
}

pub type Expander = Box<
    dyn Fn(&TokenizedLine, &SymbolMap) -> Result<Vec<Vec<Token>>, AssemblyError> + Send + Sync,
>;

pub struct PseudoInstruction {
    name: String,
    signature: Vec<PseudoTokenKind>,
    expander: Expander,
}

impl PseudoInstruction {
    pub fn new(name: impl Into<String>, signature: Vec<PseudoTokenKind>, expander: Expander) -> Self {
        Self {
            name: name.into(),
            signature,
            expander,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rewrites `line` into real instruction lines. `NotAPseudoOp` means the
    /// operands do not fit this pseudo's signature and the line should fall
    /// through to ordinary instruction handling; any other error is a genuine
    /// expansion failure.
    pub fn expand(
        &self,
        line: &TokenizedLine,
        symbols: &SymbolMap,
        isa: &Isa,
    ) -> Result<Vec<Vec<Token>>, AssemblyError> {
        let operands = &line.tokens[1..];
        if operands.len() != self.signature.len() {
            return Err(AssemblyError::NotAPseudoOp);
        }
        for (kind, token) in self.signature.iter().zip(operands) {
            if *kind == PseudoTokenKind::Reg
                && isa.resolve_register(strip_parens(&token.value)).is_none()
            {
                return Err(AssemblyError::NotAPseudoOp);
            }
        }
        (self.expander)(line, symbols)
    }
}

/// `<op> rd, symbol` → `auipc rd, %pcrel_hi(symbol)` followed by
/// `<op> rd, %pcrel_lo(symbol + 4)(rd)`.
pub fn pseudo_load(name: &str) -> PseudoInstruction {
    let mnemonic = name.to_string();
    PseudoInstruction::new(
        name,
        vec![PseudoTokenKind::Reg, PseudoTokenKind::Imm],
        Box::new(move |line, _| {
            let rd = &line.tokens[1];
            let target = &line.tokens[2];
            Ok(vec![
                vec![
                    Token::new("auipc"),
                    rd.clone(),
                    Token::with_relocation(target.value.clone(), "%pcrel_hi"),
                ],
                vec![
                    Token::new(mnemonic.clone()),
                    rd.clone(),
                    Token::with_relocation(format!("({} + 4)", target.value), "%pcrel_lo"),
                    rd.clone(),
                ],
            ])
        }),
    )
}

/// `<op> rs, symbol, rt` → `auipc rt, %pcrel_hi(symbol)` followed by
/// `<op> rs, %pcrel_lo(symbol + 4)(rt)`.
///
/// The store only acts as a pseudo when the middle operand is not a literal
/// offset; `sw x1, 8(x2)` falls through to the real store.
pub fn pseudo_store(name: &str) -> PseudoInstruction {
    let mnemonic = name.to_string();
    PseudoInstruction::new(
        name,
        vec![
            PseudoTokenKind::Reg,
            PseudoTokenKind::Imm,
            PseudoTokenKind::Reg,
        ],
        Box::new(move |line, _| {
            let rs = &line.tokens[1];
            let target = &line.tokens[2];
            let scratch = &line.tokens[3];
            if parse_immediate(&target.value).is_some() {
                return Err(AssemblyError::NotAPseudoOp);
            }
            Ok(vec![
                vec![
                    Token::new("auipc"),
                    scratch.clone(),
                    Token::with_relocation(target.value.clone(), "%pcrel_hi"),
                ],
                vec![
                    Token::new(mnemonic.clone()),
                    rs.clone(),
                    Token::with_relocation(format!("({} + 4)", target.value), "%pcrel_lo"),
                    scratch.clone(),
                ],
            ])
        }),
    )
}
