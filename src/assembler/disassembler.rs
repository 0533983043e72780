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

//! Walking assembled bytes back into instruction text.

use crate::assembler::matcher::Matcher;
use crate::errors::AssemblyError;
use crate::isa::Isa;
use std::collections::BTreeMap;

/// Result of disassembling a single instruction word.
#[derive(Debug, Clone)]
pub struct OpDisassembleResult {
    pub text: String,
    pub bytes_consumed: usize,
    pub error: Option<AssemblyError>,
}

/// Result of disassembling a whole byte stream. Undecodable words are
/// recorded per address and do not halt the walk.
#[derive(Debug, Clone, Default)]
pub struct DisassembleResult {
    pub lines: Vec<String>,
    pub errors: Vec<(u64, AssemblyError)>,
}

pub(crate) fn disassemble_word(
    matcher: &Matcher,
    isa: &Isa,
    word: u32,
    symbols: &BTreeMap<u64, String>,
    addr: u64,
) -> OpDisassembleResult {
    match matcher.match_instruction(word) {
        Ok(instr) => OpDisassembleResult {
            text: instr.decode(word, addr, symbols, isa).join(" "),
            bytes_consumed: instr.size(),
            error: None,
        },
        Err(error) => OpDisassembleResult {
            text: "unknown instruction".to_string(),
            bytes_consumed: isa.instr_byte_alignment() as usize,
            error: Some(error),
        },
    }
}

/// Walks `data` from `base_addr`, decoding one instruction at a time. Each
/// successful decode advances by the instruction's size; failures advance by
/// the ISA's instruction byte alignment. The walk stops cleanly when fewer
/// than one alignment unit of bytes remains.
pub(crate) fn disassemble_bytes(
    matcher: &Matcher,
    isa: &Isa,
    data: &[u8],
    symbols: &BTreeMap<u64, String>,
    base_addr: u64,
) -> DisassembleResult {
    let alignment = isa.instr_byte_alignment() as usize;
    let mut result = DisassembleResult::default();
    let mut offset = 0usize;
    while offset + alignment <= data.len() {
        let mut word = 0u32;
        for (i, byte) in data[offset..].iter().take(4).enumerate() {
            word |= (*byte as u32) << (8 * i);
        }
        let addr = base_addr + offset as u64;
        let decoded = disassemble_word(matcher, isa, word, symbols, addr);
        result.lines.push(decoded.text);
        if let Some(error) = decoded.error {
            result.errors.push((addr, error));
        }
        offset += decoded.bytes_consumed;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(isa: &Isa) -> Matcher {
        Matcher::new(&isa.instructions()).unwrap()
    }

    #[test]
    fn test_disassemble_word() {
        let isa = Isa::rv32i(&[]);
        let m = matcher(&isa);
        let symbols = BTreeMap::new();
        let res = disassemble_word(&m, &isa, 0x0050_0093, &symbols, 0);
        assert_eq!(res.text, "addi x1 x0 5");
        assert_eq!(res.bytes_consumed, 4);
        assert!(res.error.is_none());
    }

    #[test]
    fn test_walk_with_failure_recovery() {
        let isa = Isa::rv32i(&[]);
        let m = matcher(&isa);
        let symbols = BTreeMap::new();
        // addi, garbage, addi
        let mut data = Vec::new();
        data.extend_from_slice(&0x0050_0093u32.to_le_bytes());
        data.extend_from_slice(&0x0000_0000u32.to_le_bytes());
        data.extend_from_slice(&0x0010_0093u32.to_le_bytes());
        let res = disassemble_bytes(&m, &isa, &data, &symbols, 0);
        assert_eq!(
            res.lines,
            vec!["addi x1 x0 5", "unknown instruction", "addi x1 x0 1"]
        );
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].0, 4);
    }

    #[test]
    fn test_partial_trailing_word_is_skipped() {
        let isa = Isa::rv32i(&[]);
        let m = matcher(&isa);
        let symbols = BTreeMap::new();
        let mut data = Vec::new();
        data.extend_from_slice(&0x0050_0093u32.to_le_bytes());
        data.extend_from_slice(&[0x93, 0x00]);
        let res = disassemble_bytes(&m, &isa, &data, &symbols, 0);
        assert_eq!(res.lines.len(), 1);
        assert!(res.errors.is_empty());
    }

    #[test]
    fn test_compressed_walk_mixes_widths() {
        let isa = Isa::rv32i(&['C']);
        let m = matcher(&isa);
        let symbols = BTreeMap::new();
        let mut data = Vec::new();
        data.extend_from_slice(&0x8C65u16.to_le_bytes()); // c.and x8, x9
        data.extend_from_slice(&0x0050_0093u32.to_le_bytes());
        let res = disassemble_bytes(&m, &isa, &data, &symbols, 0);
        assert_eq!(res.lines, vec!["c.and x8 x9", "addi x1 x0 5"]);
        assert!(res.errors.is_empty());
    }
}
