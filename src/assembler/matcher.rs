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

//! The opcode discriminator trie used for disassembly. Each level groups the
//! registered instructions by their n-th opcode part; leaves hold a unique
//! instruction, optionally guarded by an extra-match predicate.

use crate::errors::AssemblyError;
use crate::isa::instruction::{Instruction, OpPart};
use std::collections::BTreeMap;
use std::sync::Arc;

struct MatchNode {
    matcher: OpPart,
    children: Vec<MatchNode>,
    instruction: Option<Arc<Instruction>>,
    /// The node's own opcode part was already consumed at a shallower level;
    /// matching is delegated to the instruction's extra conditions.
    match_on_extras: bool,
}

impl MatchNode {
    fn leaf(matcher: OpPart, instruction: Arc<Instruction>, match_on_extras: bool) -> Self {
        Self {
            matcher,
            children: Vec::new(),
            instruction: Some(instruction),
            match_on_extras,
        }
    }

    fn matches(&self, word: u32) -> bool {
        if self.match_on_extras {
            self.instruction
                .as_ref()
                .is_some_and(|instr| instr.matches_with_extras(word))
        } else {
            self.matcher.matches(word)
        }
    }
}

pub struct Matcher {
    root: MatchNode,
}

impl Matcher {
    pub fn new(instructions: &[Arc<Instruction>]) -> Result<Self, AssemblyError> {
        Ok(Self {
            root: build_node(instructions, 1, OpPart::new(0, 0, 0))?,
        })
    }

    /// Returns the unique instruction whose opcode parts (and extra
    /// conditions, where present) all match `word`.
    pub fn match_instruction(&self, word: u32) -> Result<&Arc<Instruction>, AssemblyError> {
        match_rec(word, &self.root, true).ok_or(AssemblyError::UnknownInstruction { word })
    }
}

fn key_part(instr: &Arc<Instruction>, depth: usize) -> OpPart {
    let parts = instr.op_parts();
    parts[parts.len().min(depth) - 1]
}

fn build_node(
    instructions: &[Arc<Instruction>],
    depth: usize,
    matcher: OpPart,
) -> Result<MatchNode, AssemblyError> {
    // Group by the opcode part at this depth. BTreeMap keys keep child order
    // reproducible across runs.
    let mut groups: BTreeMap<OpPart, Vec<Arc<Instruction>>> = BTreeMap::new();
    for instr in instructions {
        groups.entry(key_part(instr, depth)).or_default().push(instr.clone());
    }

    let mut node = MatchNode {
        matcher,
        children: Vec::new(),
        instruction: None,
        match_on_extras: false,
    };

    for (part, group) in groups {
        let (continuing, exhausted): (Vec<_>, Vec<_>) = group
            .iter()
            .cloned()
            .partition(|instr| instr.op_parts().len() > depth);

        let mut plain: Vec<_> = exhausted
            .iter()
            .filter(|instr| !instr.has_extra_matcher())
            .cloned()
            .collect();
        let mut extras: Vec<_> = exhausted
            .iter()
            .filter(|instr| instr.has_extra_matcher())
            .cloned()
            .collect();

        // An instruction that is out of discriminating opcode parts while
        // others still share its part sequence cannot be told apart, unless
        // an extra-match predicate steps in as the final discriminator.
        if plain.len() >= 2 || (plain.len() == 1 && !continuing.is_empty()) {
            let first = plain[0].name().to_string();
            let second = group
                .iter()
                .find(|other| other.name() != first)
                .map(|other| other.name().to_string())
                .unwrap_or_else(|| first.clone());
            return Err(AssemblyError::AmbiguousEncoding { first, second });
        }

        if !continuing.is_empty() {
            node.children.push(build_node(&continuing, depth + 1, part)?);
        }

        // Predicate-guarded leaves come before the plain fallback so the
        // extra conditions act as the discriminator.
        extras.sort_by(|a, b| a.name().cmp(b.name()));
        for instr in extras {
            let consumed = instr.op_parts().len() < depth;
            node.children.push(MatchNode::leaf(part, instr, consumed));
        }
        for instr in plain.drain(..) {
            node.children.push(MatchNode::leaf(part, instr, false));
        }
    }

    Ok(node)
}

fn match_rec<'a>(word: u32, node: &'a MatchNode, is_root: bool) -> Option<&'a Arc<Instruction>> {
    if is_root || node.matches(word) {
        if !node.children.is_empty() {
            for child in &node.children {
                if let Some(found) = match_rec(word, child, false) {
                    return Some(found);
                }
            }
        } else if let Some(instr) = &node.instruction {
            if instr.matches_with_extras(word) {
                return Some(instr);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Isa;
    use crate::isa::instruction::{Field, ImmPart, ImmSymbolKind, Repr};

    fn i_type(name: &str, opcode: u32, funct3: u32) -> Arc<Instruction> {
        Arc::new(Instruction::new(
            name,
            vec![OpPart::new(opcode, 0, 6), OpPart::new(funct3, 12, 14)],
            vec![
                Field::reg(1, 7, 11, "rd"),
                Field::reg(2, 15, 19, "rs1"),
                Field::imm(3, 12, Repr::Signed, vec![ImmPart::new(0, 20, 31)], ImmSymbolKind::None),
            ],
        ))
    }

    #[test]
    fn test_matches_rv32i_words() {
        let isa = Isa::rv32i(&['M']);
        let matcher = Matcher::new(&isa.instructions()).unwrap();
        let cases: &[(&str, u32)] = &[
            ("beq", 0b11111110000000000000111011100011),
            ("addi", 0b00000111101100010000000010010011),
            ("slti", 0b00000000000100010010000100010011),
            ("xori", 0b00000000000100010100000100010011),
            ("slli", 0b00000000000100010001000100010011),
            ("srai", 0b01000000000100010101000100010011),
            ("add", 0b00000000001000010000000100110011),
            ("sub", 0b01000000001000010000000100110011),
            ("mul", 0b00000010001000010000000100110011),
            ("lui", 0x0001_22B7),
            ("ecall", 0x0000_0073),
        ];
        for (name, word) in cases {
            let matched = matcher.match_instruction(*word).unwrap();
            assert_eq!(matched.name(), *name, "word {word:#010x}");
        }
    }

    #[test]
    fn test_unknown_word() {
        let isa = Isa::rv32i(&[]);
        let matcher = Matcher::new(&isa.instructions()).unwrap();
        assert!(matches!(
            matcher.match_instruction(0x0000_0000),
            Err(AssemblyError::UnknownInstruction { word: 0 })
        ));
    }

    #[test]
    fn test_full_table_totality() {
        // Every instruction in the table must match its own canonical
        // encoding.
        for isa in [Isa::rv32i(&['M', 'C']), Isa::rv64i(&['M', 'C'])] {
            let instructions = isa.instructions();
            let matcher = Matcher::new(&instructions).unwrap();
            for instr in &instructions {
                let mut word = 0u32;
                for part in instr.op_parts() {
                    word |= part.value << part.range.lo;
                }
                let matched = matcher.match_instruction(word).unwrap();
                assert_eq!(matched.name(), instr.name(), "word {word:#010x}");
            }
        }
    }

    #[test]
    fn test_identical_encodings_rejected() {
        let table = vec![i_type("addi", 0b0010011, 0b000), i_type("addi2", 0b0010011, 0b000)];
        let result = Matcher::new(&table);
        assert!(matches!(
            result,
            Err(AssemblyError::AmbiguousEncoding { .. })
        ));
    }

    #[test]
    fn test_prefix_alias_rejected() {
        // One instruction's part sequence is a strict prefix of another's:
        // a U-type-shaped instruction on the same opcode as an I-type.
        let short = Arc::new(Instruction::new(
            "short",
            vec![OpPart::new(0b0010011, 0, 6)],
            vec![
                Field::reg(1, 7, 11, "rd"),
                Field::imm(2, 32, Repr::Hex, vec![ImmPart::new(0, 12, 31)], ImmSymbolKind::None),
            ],
        ));
        let result = Matcher::new(&[i_type("addi", 0b0010011, 0b000), short]);
        assert!(matches!(
            result,
            Err(AssemblyError::AmbiguousEncoding { .. })
        ));
    }

    #[test]
    fn test_extra_match_predicate_discriminates() {
        // Two instructions with identical opcode parts; the predicate on one
        // of them inspects a reserved field to break the tie.
        let special = Arc::new(
            Instruction::new(
                "special",
                vec![OpPart::new(0b0010011, 0, 6), OpPart::new(0b000, 12, 14)],
                vec![
                    Field::reg(1, 7, 11, "rd"),
                    Field::reg(2, 15, 19, "rs1"),
                    Field::imm(
                        3,
                        12,
                        Repr::Signed,
                        vec![ImmPart::new(0, 20, 31)],
                        ImmSymbolKind::None,
                    ),
                ],
            )
            .with_extra_matcher(Arc::new(|word| (word >> 20) == 0xFFF)),
        );
        let table = vec![i_type("addi", 0b0010011, 0b000), special];
        let matcher = Matcher::new(&table).unwrap();

        // imm == 0xFFF: predicate applies.
        let matched = matcher.match_instruction(0xFFF0_0093).unwrap();
        assert_eq!(matched.name(), "special");
        // Any other immediate falls back to the plain instruction.
        let matched = matcher.match_instruction(0x0050_0093).unwrap();
        assert_eq!(matched.name(), "addi");
    }

    #[test]
    fn test_deterministic_build() {
        // Identical tables presented in different orders decode identically.
        let isa = Isa::rv32i(&['M']);
        let mut reversed = isa.instructions();
        reversed.reverse();
        let a = Matcher::new(&isa.instructions()).unwrap();
        let b = Matcher::new(&reversed).unwrap();
        for word in [0x0050_0093u32, 0x0000_0073, 0x4000_00B3] {
            let ra = a.match_instruction(word).map(|i| i.name().to_string());
            let rb = b.match_instruction(word).map(|i| i.name().to_string());
            assert_eq!(ra.ok(), rb.ok());
        }
    }
}
