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

//! The instruction/field/opcode data model: fixed opcode bit ranges, register
//! fields and scattered immediate fields, with encode, decode and link-time
//! patching over 16- and 32-bit instruction words.

use crate::errors::AssemblyError;
use crate::isa::Isa;
use crate::location::{Location, Token};
use crate::numeric::{fits_signed, fits_unsigned, parse_immediate, sign_extend};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An inclusive range of bit positions within an instruction word.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BitRange {
    pub lo: u32,
    pub hi: u32,
}

impl BitRange {
    pub const fn new(lo: u32, hi: u32) -> Self {
        assert!(lo <= hi && hi < 32);
        Self { lo, hi }
    }

    pub const fn width(&self) -> u32 {
        self.hi - self.lo + 1
    }

    /// Mask of `width` bits, aligned to bit 0.
    pub const fn mask(&self) -> u32 {
        if self.width() >= 32 {
            u32::MAX
        } else {
            (1 << self.width()) - 1
        }
    }

    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.lo) & self.mask()
    }
}

/// A fixed-value bit range: when `value` occupies `range` of a word, this
/// opcode position matches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OpPart {
    pub value: u32,
    pub range: BitRange,
}

impl OpPart {
    pub const fn new(value: u32, lo: u32, hi: u32) -> Self {
        let range = BitRange::new(lo, hi);
        assert!(value <= range.mask());
        Self { value, range }
    }

    pub const fn matches(&self, word: u32) -> bool {
        self.range.extract(word) == self.value
    }
}

/// Placement of one slice of an immediate: bits
/// `[offset + width - 1 : offset]` of the immediate value occupy `range` of
/// the encoded word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImmPart {
    pub offset: u32,
    pub range: BitRange,
}

impl ImmPart {
    pub const fn new(offset: u32, lo: u32, hi: u32) -> Self {
        Self {
            offset,
            range: BitRange::new(lo, hi),
        }
    }

    fn encode_into(&self, word: &mut u32, value: u32) {
        *word |= ((value >> self.offset) & self.range.mask()) << self.range.lo;
    }

    fn decode_from(&self, word: u32) -> u32 {
        self.range.extract(word) << self.offset
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Repr {
    Signed,
    Unsigned,
    Hex,
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repr::Signed => write!(f, "signed"),
            Repr::Unsigned => write!(f, "unsigned"),
            Repr::Hex => write!(f, "hex"),
        }
    }
}

/// How an immediate field treats a symbol operand: not at all, as an absolute
/// address, or relative to the instruction's own address (branches, jumps).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImmSymbolKind {
    None,
    Absolute,
    Relative,
}

/// One operand field of an instruction, tagged with the index of the source
/// token it reads (the mnemonic is token 0).
#[derive(Debug, Clone)]
pub enum Field {
    /// A register index placed in a bit range. A 5-bit range addresses
    /// `x0..x31`; a 3-bit range addresses the compressed block `x8..x15`.
    Reg {
        token_idx: usize,
        range: BitRange,
        role: &'static str,
    },
    Imm {
        token_idx: usize,
        width: u32,
        repr: Repr,
        parts: Vec<ImmPart>,
        symbol_kind: ImmSymbolKind,
    },
}

impl Field {
    pub fn reg(token_idx: usize, lo: u32, hi: u32, role: &'static str) -> Self {
        Field::Reg {
            token_idx,
            range: BitRange::new(lo, hi),
            role,
        }
    }

    pub fn imm(
        token_idx: usize,
        width: u32,
        repr: Repr,
        parts: Vec<ImmPart>,
        symbol_kind: ImmSymbolKind,
    ) -> Self {
        Field::Imm {
            token_idx,
            width,
            repr,
            parts,
            symbol_kind,
        }
    }

    pub fn token_idx(&self) -> usize {
        match self {
            Field::Reg { token_idx, .. } | Field::Imm { token_idx, .. } => *token_idx,
        }
    }
}

/// Secondary decode test beyond opcode bits, used to disambiguate
/// instructions whose opcode parts alias.
pub type ExtraMatcher = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// A deferred immediate encoding: the field at `field_idx` reads the symbol
/// expression in `token` once addresses are known.
#[derive(Debug, Clone)]
pub struct FieldLink {
    pub field_idx: usize,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct EncodedInstr {
    pub word: u32,
    pub link: Option<FieldLink>,
}

pub struct Instruction {
    name: String,
    op_parts: Vec<OpPart>,
    fields: Vec<Field>,
    extra_matcher: Option<ExtraMatcher>,
    bits: u32,
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("name", &self.name)
            .field("op_parts", &self.op_parts)
            .field("fields", &self.fields)
            .field("bits", &self.bits)
            .field("has_extra_matcher", &self.extra_matcher.is_some())
            .finish()
    }
}

fn width_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

pub(crate) fn strip_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(s)
}

impl Instruction {
    /// Builds an instruction and checks its bit-layout contract: opcode parts
    /// and field bit ranges must be pairwise disjoint and together cover
    /// exactly a 16- or 32-bit word. The tables are compiled in, so a
    /// violation is a table bug and panics.
    pub fn new(name: impl Into<String>, op_parts: Vec<OpPart>, fields: Vec<Field>) -> Self {
        let name = name.into();
        assert!(!op_parts.is_empty(), "instruction '{name}' has no opcode parts");

        let mut covered = 0u32;
        let mut cover = |range: &BitRange| {
            let mask = range.mask() << range.lo;
            assert!(
                covered & mask == 0,
                "overlapping bit ranges in instruction '{name}'"
            );
            covered |= mask;
        };
        for part in &op_parts {
            cover(&part.range);
        }
        for field in &fields {
            match field {
                Field::Reg { range, .. } => cover(range),
                Field::Imm { parts, .. } => {
                    for part in parts {
                        cover(&part.range);
                    }
                }
            }
        }
        let bits = match covered {
            0xFFFF => 16,
            u32::MAX => 32,
            _ => panic!("instruction '{name}' does not cover a full 16- or 32-bit word"),
        };

        Self {
            name,
            op_parts,
            fields,
            extra_matcher: None,
            bits,
        }
    }

    pub fn with_extra_matcher(mut self, matcher: ExtraMatcher) -> Self {
        self.extra_matcher = Some(matcher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_parts(&self) -> &[OpPart] {
        &self.op_parts
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn has_extra_matcher(&self) -> bool {
        self.extra_matcher.is_some()
    }

    /// Instruction size in bytes.
    pub fn size(&self) -> usize {
        (self.bits / 8) as usize
    }

    pub fn matches(&self, word: u32) -> bool {
        self.op_parts.iter().all(|part| part.matches(word))
    }

    pub fn matches_with_extras(&self, word: u32) -> bool {
        self.matches(word)
            && self
                .extra_matcher
                .as_ref()
                .map_or(true, |matcher| matcher(word))
    }

    /// Encodes one tokenized line (mnemonic plus operands). Immediate
    /// operands that are symbols or carry a relocation encode as zero and
    /// report a [`FieldLink`] for pass-3 resolution.
    pub fn encode(
        &self,
        tokens: &[Token],
        isa: &Isa,
        location: Location,
    ) -> Result<EncodedInstr, AssemblyError> {
        if tokens.len() != 1 + self.fields.len() {
            return Err(AssemblyError::WrongOperandCount {
                line: location.line,
                mnemonic: self.name.clone(),
                expected: self.fields.len(),
                found: tokens.len().saturating_sub(1),
            });
        }

        let mut word = 0u32;
        for part in &self.op_parts {
            word |= part.value << part.range.lo;
        }

        let mut link = None;
        for (field_idx, field) in self.fields.iter().enumerate() {
            let token = &tokens[field.token_idx()];
            match field {
                Field::Reg { range, .. } => {
                    if token.relocation.is_some() {
                        return Err(AssemblyError::BadRelocationTarget {
                            line: location.line,
                            token: token.value.clone(),
                        });
                    }
                    let reg_name = strip_parens(&token.value);
                    let index = isa.resolve_register(reg_name).ok_or_else(|| {
                        AssemblyError::BadRegister {
                            line: location.line,
                            token: token.value.clone(),
                        }
                    })?;
                    let encoded = if range.width() == 3 {
                        if !(8..=15).contains(&index) {
                            return Err(AssemblyError::BadRegister {
                                line: location.line,
                                token: token.value.clone(),
                            });
                        }
                        index - 8
                    } else {
                        index
                    };
                    word |= encoded << range.lo;
                }
                Field::Imm {
                    width,
                    repr,
                    parts,
                    ..
                } => {
                    if token.relocation.is_some() {
                        link = Some(FieldLink {
                            field_idx,
                            token: token.clone(),
                        });
                        continue;
                    }
                    match parse_immediate(&token.value) {
                        Some(value) => {
                            let in_range = match repr {
                                Repr::Signed => fits_signed(value, *width),
                                Repr::Unsigned | Repr::Hex => fits_unsigned(value, *width),
                            };
                            if !in_range {
                                return Err(AssemblyError::ImmediateOutOfRange {
                                    line: location.line,
                                    token: token.value.clone(),
                                    width: *width,
                                    repr: *repr,
                                });
                            }
                            let masked = (value as u32) & width_mask(*width);
                            for part in parts {
                                part.encode_into(&mut word, masked);
                            }
                        }
                        // Not a literal: defer to pass 3 as a symbol
                        // expression.
                        None => {
                            link = Some(FieldLink {
                                field_idx,
                                token: token.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(EncodedInstr { word, link })
    }

    /// Patches the resolved value of a link request into the designated
    /// immediate field of an already-encoded word.
    pub fn apply_field_link(
        &self,
        word: u32,
        field_idx: usize,
        value: i64,
        instr_addr: u64,
        token: &Token,
        location: Location,
    ) -> Result<u32, AssemblyError> {
        let Some(Field::Imm {
            width,
            repr,
            parts,
            symbol_kind,
            ..
        }) = self.fields.get(field_idx)
        else {
            return Err(AssemblyError::BadRelocationTarget {
                line: location.line,
                token: token.value.clone(),
            });
        };

        let mut value = value;
        if token.relocation.is_none() && *symbol_kind == ImmSymbolKind::Relative {
            value = value.wrapping_sub(instr_addr as i64);
        }

        let in_range = match repr {
            Repr::Signed => fits_signed(value, *width),
            Repr::Unsigned | Repr::Hex => fits_unsigned(value, *width),
        };
        if !in_range {
            return Err(match &token.relocation {
                Some(relocation) => AssemblyError::RelocationOverflow {
                    line: location.line,
                    relocation: relocation.clone(),
                    value,
                },
                None => AssemblyError::ImmediateOutOfRange {
                    line: location.line,
                    token: token.value.clone(),
                    width: *width,
                    repr: *repr,
                },
            });
        }

        let mut word = word;
        let masked = (value as u32) & width_mask(*width);
        for part in parts {
            part.encode_into(&mut word, masked);
        }
        Ok(word)
    }

    /// Decodes a matched word back into tokens in token-index order, mnemonic
    /// first. Registers print canonically as `xN`; relative immediates print
    /// a symbol name when one is known at the target address.
    pub fn decode(
        &self,
        word: u32,
        addr: u64,
        symbols: &BTreeMap<u64, String>,
        isa: &Isa,
    ) -> Vec<String> {
        let mut out = vec![String::new(); 1 + self.fields.len()];
        out[0] = self.name.clone();
        for field in &self.fields {
            let text = match field {
                Field::Reg { range, .. } => {
                    let mut index = range.extract(word);
                    if range.width() == 3 {
                        index += 8;
                    }
                    isa.register_name(index)
                }
                Field::Imm {
                    width,
                    repr,
                    parts,
                    symbol_kind,
                    ..
                } => {
                    let mut raw = 0u32;
                    for part in parts {
                        raw |= part.decode_from(word);
                    }
                    let value = match repr {
                        Repr::Signed => sign_extend(raw as i64, *width),
                        Repr::Unsigned | Repr::Hex => raw as i64,
                    };
                    let target_symbol = if *symbol_kind == ImmSymbolKind::Relative {
                        symbols.get(&addr.wrapping_add(value as u64)).cloned()
                    } else {
                        None
                    };
                    match target_symbol {
                        Some(name) => name,
                        None => match repr {
                            Repr::Hex => format!("{value:#x}"),
                            _ => value.to_string(),
                        },
                    }
                }
            };
            out[field.token_idx()] = text;
        }
        out
    }
}
