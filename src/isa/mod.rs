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

//! Instruction set definitions: register naming, enabled extensions, and the
//! per-extension instruction/pseudo-instruction tables.

pub(crate) mod formats;
pub mod instruction;
pub mod pseudo;
pub mod relocations;
mod rv_c;
mod rv_i;
mod rv_m;

use crate::isa::instruction::Instruction;
use crate::isa::pseudo::PseudoInstruction;
use crate::isa::relocations::{Relocation, rv_relocations};
use std::collections::BTreeSet;
use std::sync::Arc;

/// ABI aliases indexed by register number (`x0` = `zero`, …).
pub const REG_ALIASES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Xlen {
    Rv32,
    Rv64,
}

/// An immutable ISA description: base register width and the set of enabled
/// extensions. The instruction tables derived from it are built once per
/// assembler and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Isa {
    xlen: Xlen,
    extensions: BTreeSet<char>,
}

impl Isa {
    pub fn rv32i(extensions: &[char]) -> Self {
        Self {
            xlen: Xlen::Rv32,
            extensions: extensions.iter().copied().collect(),
        }
    }

    pub fn rv64i(extensions: &[char]) -> Self {
        Self {
            xlen: Xlen::Rv64,
            extensions: extensions.iter().copied().collect(),
        }
    }

    pub fn name(&self) -> String {
        let base = match self.xlen {
            Xlen::Rv32 => "RV32I",
            Xlen::Rv64 => "RV64I",
        };
        let exts: String = self.extensions.iter().collect();
        format!("{base}{exts}")
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    pub fn extensions_enabled(&self) -> &BTreeSet<char> {
        &self.extensions
    }

    /// Instruction byte alignment: 2 with the compressed extension, 4
    /// otherwise.
    pub fn instr_byte_alignment(&self) -> u32 {
        if self.extensions.contains(&'C') { 2 } else { 4 }
    }

    /// Canonical name of register `index` (`x0`..`x31`).
    pub fn register_name(&self, index: u32) -> String {
        debug_assert!(index < 32);
        format!("x{index}")
    }

    /// ABI alias of register `index` (`zero`, `sp`, `a0`, …).
    pub fn register_alias(&self, index: u32) -> &'static str {
        REG_ALIASES[index as usize]
    }

    /// Resolves a register operand, accepting both canonical `xN` names and
    /// ABI aliases.
    pub fn resolve_register(&self, name: &str) -> Option<u32> {
        if let Some(digits) = name.strip_prefix('x') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                let index = digits.parse::<u32>().ok()?;
                if index < 32 {
                    return Some(index);
                }
            }
            return None;
        }
        REG_ALIASES
            .iter()
            .position(|alias| *alias == name)
            .map(|index| index as u32)
    }

    /// Builds the full instruction and pseudo-instruction tables for this
    /// ISA. Extensions without instruction tables (A, F, D) are accepted but
    /// contribute nothing.
    pub fn instruction_set(&self) -> (Vec<Arc<Instruction>>, Vec<PseudoInstruction>) {
        let mut instructions = Vec::new();
        let mut pseudos = Vec::new();
        rv_i::enable(self, &mut instructions, &mut pseudos);
        for extension in &self.extensions {
            match extension {
                'M' => rv_m::enable(self, &mut instructions, &mut pseudos),
                'C' => rv_c::enable(self, &mut instructions, &mut pseudos),
                _ => {}
            }
        }
        (instructions, pseudos)
    }

    pub fn instructions(&self) -> Vec<Arc<Instruction>> {
        self.instruction_set().0
    }

    pub fn pseudo_instructions(&self) -> Vec<PseudoInstruction> {
        self.instruction_set().1
    }

    pub fn relocations(&self) -> Vec<Relocation> {
        rv_relocations()
    }
}
