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

//! The four-pass assembler driver.
//!
//! Pass 0 tokenizes each line and splits out symbols, directives and
//! relocation hints. Pass 1 expands pseudo-instructions. Pass 2 encodes
//! instructions and directives into section bytes, recording link requests
//! for symbolic immediates. Pass 3 resolves those requests and patches the
//! encoded words. Errors accumulate per pass; a pass with errors does not
//! advance to the next one.

pub mod directives;
pub mod matcher;
pub mod symbols;

mod disassembler;

pub use disassembler::{DisassembleResult, OpDisassembleResult};

use crate::errors::AssemblyError;
use crate::expr::{self, ExprError};
use crate::isa::Isa;
use crate::isa::instruction::Instruction;
use crate::isa::pseudo::PseudoInstruction;
use crate::isa::relocations::Relocation;
use crate::location::{Location, Token, TokenizedLine};
use crate::parser;
use crate::program::{Program, ProgramSection, TEXT_SECTION};
use directives::DirectiveEffect;
use matcher::Matcher;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use symbols::{Symbol, SymbolKind, SymbolMap};

/// Section base addresses and lexical configuration, captured immutably when
/// the assembler is constructed.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub text_start: u64,
    pub data_start: u64,
    pub bss_start: u64,
    pub comment_char: char,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            text_start: 0x0,
            data_start: 0x1000_0000,
            bss_start: 0x1100_0000,
            comment_char: '#',
        }
    }
}

/// A deferred encoding action: an instruction whose immediate field awaits a
/// symbol value, recorded in pass 2 and satisfied in pass 3.
struct LinkRequest {
    location: Location,
    offset: u64,
    section: String,
    instr: Arc<Instruction>,
    field_idx: usize,
    token: Token,
}

/// An assembler for one ISA configuration. The instruction tables and the
/// matcher tree are built once at construction and shared immutably across
/// all `assemble`/`disassemble` calls.
pub struct Assembler {
    isa: Isa,
    options: AssemblerOptions,
    instructions: BTreeMap<String, Arc<Instruction>>,
    pseudos: BTreeMap<String, PseudoInstruction>,
    relocations: BTreeMap<String, Relocation>,
    section_bases: BTreeMap<String, u64>,
    matcher: Matcher,
}

impl Assembler {
    /// Builds the assembler for `isa`. Fails with `AmbiguousEncoding` when
    /// two registered instructions cannot be told apart when decoding.
    pub fn new(isa: Isa, options: AssemblerOptions) -> Result<Self, AssemblyError> {
        let (instruction_vec, pseudo_vec) = isa.instruction_set();
        let matcher = Matcher::new(&instruction_vec)?;

        let mut instructions = BTreeMap::new();
        for instr in instruction_vec {
            let name = instr.name().to_string();
            let previous = instructions.insert(name.clone(), instr);
            assert!(previous.is_none(), "instruction '{name}' registered twice");
        }
        let mut pseudos = BTreeMap::new();
        for pseudo in pseudo_vec {
            let name = pseudo.name().to_string();
            let previous = pseudos.insert(name.clone(), pseudo);
            assert!(previous.is_none(), "pseudo-instruction '{name}' registered twice");
        }
        let mut relocations = BTreeMap::new();
        for relocation in isa.relocations() {
            let name = relocation.name().to_string();
            let previous = relocations.insert(name.clone(), relocation);
            assert!(previous.is_none(), "relocation '{name}' registered twice");
        }

        let mut section_bases = BTreeMap::new();
        section_bases.insert(".text".to_string(), options.text_start);
        section_bases.insert(".data".to_string(), options.data_start);
        section_bases.insert(".bss".to_string(), options.bss_start);

        Ok(Self {
            isa,
            options,
            instructions,
            pseudos,
            relocations,
            section_bases,
            matcher,
        })
    }

    pub fn isa(&self) -> &Isa {
        &self.isa
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Union of real and pseudo mnemonics, e.g. for editor highlighting.
    pub fn opcodes(&self) -> BTreeSet<String> {
        self.instructions
            .keys()
            .chain(self.pseudos.keys())
            .cloned()
            .collect()
    }

    pub fn assemble(&self, source: &str) -> Result<Program, Vec<AssemblyError>> {
        self.assemble_with(source, None, None)
    }

    /// Assembles `source`, optionally seeding the symbol map (e.g. with
    /// environment constants) and recording a source hash in the program.
    pub fn assemble_with(
        &self,
        source: &str,
        symbols: Option<&SymbolMap>,
        source_hash: Option<&str>,
    ) -> Result<Program, Vec<AssemblyError>> {
        let mut symbol_map = symbols.cloned().unwrap_or_default();

        let tokenized = self.pass0(source)?;
        let expanded = self.pass1(&tokenized, &symbol_map)?;
        let (mut program, link_requests) = self.pass2(&expanded, &mut symbol_map)?;
        self.pass3(&mut program, &link_requests, &mut symbol_map)?;

        program.entry_point = self.options.text_start;
        program.source_hash = source_hash.map(str::to_string);
        Ok(program)
    }

    pub fn disassemble(&self, program: &Program, base_addr: u64) -> DisassembleResult {
        match program.text() {
            Some(section) => disassembler::disassemble_bytes(
                &self.matcher,
                &self.isa,
                &section.data,
                &program.symbols,
                base_addr,
            ),
            None => DisassembleResult::default(),
        }
    }

    pub fn disassemble_word(
        &self,
        word: u32,
        symbols: &BTreeMap<u64, String>,
        addr: u64,
    ) -> OpDisassembleResult {
        disassembler::disassemble_word(&self.matcher, &self.isa, word, symbols, addr)
    }

    /// Pass 0: tokenize lines, split out symbols, directives and relocation
    /// hints. Symbols on otherwise-blank lines carry onto the next line.
    fn pass0(&self, source: &str) -> Result<Vec<TokenizedLine>, Vec<AssemblyError>> {
        let mut errors = Vec::new();
        let mut lines = Vec::new();
        let mut seen_globals: BTreeSet<String> = BTreeSet::new();
        let mut carry: Vec<Symbol> = Vec::new();

        for (idx, source_line) in source.lines().enumerate() {
            let stripped = parser::strip_comment(source_line, self.options.comment_char);
            if stripped.trim().is_empty() {
                continue;
            }
            let raw = match parser::parse_line(stripped, idx) {
                Ok(raw) => raw,
                Err(error) => {
                    errors.push(error);
                    continue;
                }
            };
            if raw.labels.is_empty() && raw.tokens.is_empty() {
                continue;
            }

            let mut line = TokenizedLine::new(idx);
            let mut duplicate = false;
            for name in &raw.labels {
                let symbol = Symbol::address(name.clone());
                if !symbol.is_legal() {
                    errors.push(AssemblyError::IllegalSymbol {
                        line: idx,
                        name: name.clone(),
                    });
                }
                if !symbol.is_local() && !seen_globals.insert(name.clone()) {
                    errors.push(AssemblyError::RedefinedSymbol {
                        line: idx,
                        name: name.clone(),
                    });
                    duplicate = true;
                    break;
                }
                line.symbols.push(symbol);
            }
            if duplicate {
                continue;
            }

            // Only the leading token can be a directive; `.L…` operands
            // elsewhere on the line are ordinary symbols.
            let mut raw_tokens = raw.tokens;
            if raw_tokens.first().is_some_and(|t| t.starts_with('.')) {
                line.directive = Some(raw_tokens.remove(0));
            }

            // A token that names a registered relocation is consumed and
            // attached to the token that follows it.
            let mut pending_relocation: Option<String> = None;
            for value in raw_tokens {
                if self.relocations.contains_key(&value) {
                    pending_relocation = Some(value);
                } else {
                    line.tokens.push(match pending_relocation.take() {
                        Some(relocation) => Token::with_relocation(value, relocation),
                        None => Token::new(value),
                    });
                }
            }

            if line.tokens.is_empty() && line.directive.is_none() {
                carry.append(&mut line.symbols);
                continue;
            }
            let mut carried = std::mem::take(&mut carry);
            carried.append(&mut line.symbols);
            line.symbols = carried;

            // Section-layout directives also run here so that malformed ones
            // surface before any bytes are emitted; pass 2 re-applies them
            // when it lays the sections out.
            if let Some(directive) = &line.directive {
                if directives::is_early(directive) {
                    if let Err(error) = directives::execute(directive, &line) {
                        errors.push(error);
                    }
                }
            }
            lines.push(line);
        }

        if errors.is_empty() { Ok(lines) } else { Err(errors) }
    }

    /// Pass 1: pseudo-instruction expansion. Symbols and directives stay on
    /// the first synthesized line only.
    fn pass1(
        &self,
        lines: &[TokenizedLine],
        symbols: &SymbolMap,
    ) -> Result<Vec<TokenizedLine>, Vec<AssemblyError>> {
        let mut errors = Vec::new();
        let mut expanded = Vec::new();

        for line in lines {
            if line.directive.is_some() {
                expanded.push(line.clone());
                continue;
            }
            let Some(mnemonic) = line.tokens.first().map(|t| t.value.clone()) else {
                expanded.push(line.clone());
                continue;
            };
            let Some(pseudo) = self.pseudos.get(&mnemonic) else {
                expanded.push(line.clone());
                continue;
            };
            match pseudo.expand(line, symbols, &self.isa) {
                Ok(token_lines) => {
                    for (i, tokens) in token_lines.into_iter().enumerate() {
                        let mut new_line = TokenizedLine::new(line.location.line);
                        new_line.tokens = tokens;
                        if i == 0 {
                            new_line.symbols = line.symbols.clone();
                            new_line.directive = line.directive.clone();
                        }
                        expanded.push(new_line);
                    }
                }
                // The operands did not fit the pseudo's signature; let pass 2
                // treat the line as a real instruction.
                Err(AssemblyError::NotAPseudoOp) => expanded.push(line.clone()),
                Err(error) => {
                    if self.instructions.contains_key(&mnemonic) {
                        expanded.push(line.clone());
                    } else {
                        errors.push(error);
                    }
                }
            }
        }

        if errors.is_empty() { Ok(expanded) } else { Err(errors) }
    }

    /// Pass 2: encode directives and instructions into section bytes.
    fn pass2(
        &self,
        lines: &[TokenizedLine],
        symbol_map: &mut SymbolMap,
    ) -> Result<(Program, Vec<LinkRequest>), Vec<AssemblyError>> {
        let mut program = Program::default();
        for (name, base) in &self.section_bases {
            program.sections.insert(
                name.clone(),
                ProgramSection {
                    name: name.clone(),
                    address: *base,
                    data: Vec::new(),
                },
            );
        }

        let mut errors = Vec::new();
        let mut link_requests = Vec::new();
        let mut current = TEXT_SECTION.to_string();

        for line in lines {
            let section_base = self.section_bases[&current];
            let offset = program.sections[&current].data.len() as u64;

            for symbol in &line.symbols {
                if let Err(error) = symbol_map.insert(symbol, section_base + offset, line.location)
                {
                    errors.push(error);
                }
            }

            if let Some(directive) = &line.directive {
                match directives::execute(directive, line) {
                    Ok(DirectiveEffect::SwitchSection(section)) => current = section.to_string(),
                    Ok(DirectiveEffect::Emit(bytes)) => {
                        program
                            .sections
                            .get_mut(&current)
                            .expect("current section always registered")
                            .data
                            .extend_from_slice(&bytes);
                    }
                    Err(error) => errors.push(error),
                }
                continue;
            }
            if line.tokens.is_empty() {
                continue;
            }

            let mnemonic = &line.tokens[0].value;
            let Some(instr) = self.instructions.get(mnemonic) else {
                errors.push(AssemblyError::UnknownOpcode {
                    line: line.location.line,
                    mnemonic: mnemonic.clone(),
                });
                continue;
            };

            let alignment = self.isa.instr_byte_alignment();
            if offset % alignment as u64 != 0 {
                errors.push(AssemblyError::Misaligned {
                    line: line.location.line,
                    offset,
                    required: alignment,
                });
            }

            match instr.encode(&line.tokens, &self.isa, line.location) {
                Ok(encoded) => {
                    if let Some(field_link) = encoded.link {
                        link_requests.push(LinkRequest {
                            location: line.location,
                            offset,
                            section: current.clone(),
                            instr: instr.clone(),
                            field_idx: field_link.field_idx,
                            token: field_link.token,
                        });
                    }
                    let section = program
                        .sections
                        .get_mut(&current)
                        .expect("current section always registered");
                    section
                        .data
                        .extend_from_slice(&encoded.word.to_le_bytes()[..instr.size()]);
                    program
                        .source_mapping
                        .entry(offset)
                        .or_default()
                        .insert(line.location.line);
                }
                Err(error) => errors.push(error),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        for (name, value) in symbol_map.addresses() {
            program.symbols.insert(value, name.to_string());
        }
        Ok((program, link_requests))
    }

    /// Pass 3: evaluate symbol expressions, apply relocations, and patch the
    /// affected words in place.
    fn pass3(
        &self,
        program: &mut Program,
        link_requests: &[LinkRequest],
        symbol_map: &mut SymbolMap,
    ) -> Result<(), Vec<AssemblyError>> {
        let mut errors = Vec::new();

        for request in link_requests {
            let instr_addr = self.section_bases[&request.section] + request.offset;
            // The instruction's own address is visible to expressions.
            symbol_map.define("__address__", instr_addr, SymbolKind::Constant);

            let expression = &request.token.value;
            let mut value = match expr::evaluate(expression, symbol_map) {
                Ok(value) => value,
                Err(ExprError::UnknownSymbol(name)) => {
                    errors.push(AssemblyError::UnresolvedSymbol {
                        line: request.location.line,
                        name,
                        expression: expression.clone(),
                    });
                    continue;
                }
                Err(ExprError::DivisionByZero) => {
                    errors.push(AssemblyError::BadImmediate {
                        line: request.location.line,
                        token: expression.clone(),
                        reason: "division by zero".to_string(),
                    });
                    continue;
                }
                Err(ExprError::Malformed(reason)) => {
                    errors.push(AssemblyError::BadImmediate {
                        line: request.location.line,
                        token: expression.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if let Some(relocation) = &request.token.relocation {
                value = self.relocations[relocation].handle(value, instr_addr);
            }

            let section = program
                .sections
                .get_mut(&request.section)
                .expect("link request section always registered");
            let size = request.instr.size();
            let start = request.offset as usize;
            debug_assert!(section.data.len() >= start + size);

            let mut word = 0u32;
            for (i, byte) in section.data[start..start + size].iter().enumerate() {
                word |= (*byte as u32) << (8 * i);
            }
            match request.instr.apply_field_link(
                word,
                request.field_idx,
                value,
                instr_addr,
                &request.token,
                request.location,
            ) {
                Ok(patched) => {
                    let bytes = patched.to_le_bytes();
                    section.data[start..start + size].copy_from_slice(&bytes[..size]);
                }
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
