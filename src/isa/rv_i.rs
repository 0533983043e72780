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

//! Base integer extension: the RV32I/RV64I instruction tables and the
//! standard GNU-style pseudo-instruction expansions.

use crate::errors::AssemblyError;
use crate::isa::formats::*;
use crate::isa::instruction::{ImmSymbolKind, Instruction, OpPart, Repr};
use crate::isa::pseudo::{
    PseudoInstruction, PseudoTokenKind::Imm, PseudoTokenKind::Reg, pseudo_load, pseudo_store,
};
use crate::isa::{Isa, Xlen};
use crate::location::{Token, TokenizedLine};
use crate::numeric::{fits_signed, fits_unsigned, parse_immediate_sext32, sign_extend};
use std::sync::Arc;

pub(crate) fn enable(
    isa: &Isa,
    instructions: &mut Vec<Arc<Instruction>>,
    pseudos: &mut Vec<PseudoInstruction>,
) {
    let rv64 = isa.xlen() == Xlen::Rv64;

    enable_pseudos(rv64, pseudos);

    instructions.push(Arc::new(Instruction::new(
        "ecall",
        vec![opcode(OPC_SYSTEM), OpPart::new(0, 7, 31)],
        vec![],
    )));

    instructions.push(u_type("lui", OPC_LUI, ImmSymbolKind::None));
    instructions.push(u_type("auipc", OPC_AUIPC, ImmSymbolKind::Absolute));

    instructions.push(j_type("jal", OPC_JAL));
    instructions.push(jalr_type("jalr"));

    instructions.push(load_type("lb", 0b000));
    instructions.push(load_type("lh", 0b001));
    instructions.push(load_type("lw", 0b010));
    instructions.push(load_type("lbu", 0b100));
    instructions.push(load_type("lhu", 0b101));

    instructions.push(s_type("sb", 0b000));
    instructions.push(s_type("sh", 0b001));
    instructions.push(s_type("sw", 0b010));

    instructions.push(i_type("addi", OPC_OPIMM, 0b000));
    instructions.push(i_type("slti", OPC_OPIMM, 0b010));
    instructions.push(i_type("sltiu", OPC_OPIMM, 0b011));
    instructions.push(i_type("xori", OPC_OPIMM, 0b100));
    instructions.push(i_type("ori", OPC_OPIMM, 0b110));
    instructions.push(i_type("andi", OPC_OPIMM, 0b111));

    if rv64 {
        // RV64 widens the shamt of the base shifts to 6 bits and adds the
        // 32-bit word variants.
        instructions.push(ishift64_type("slli", OPC_OPIMM, 0b001, 0b000000));
        instructions.push(ishift64_type("srli", OPC_OPIMM, 0b101, 0b000000));
        instructions.push(ishift64_type("srai", OPC_OPIMM, 0b101, 0b010000));
        instructions.push(ishift32_type("slliw", OPC_OPIMM32, 0b001, 0b0000000));
        instructions.push(ishift32_type("srliw", OPC_OPIMM32, 0b101, 0b0000000));
        instructions.push(ishift32_type("sraiw", OPC_OPIMM32, 0b101, 0b0100000));
    } else {
        instructions.push(ishift32_type("slli", OPC_OPIMM, 0b001, 0b0000000));
        instructions.push(ishift32_type("srli", OPC_OPIMM, 0b101, 0b0000000));
        instructions.push(ishift32_type("srai", OPC_OPIMM, 0b101, 0b0100000));
    }

    instructions.push(r_type("add", OPC_OP, 0b000, 0b0000000));
    instructions.push(r_type("sub", OPC_OP, 0b000, 0b0100000));
    instructions.push(r_type("sll", OPC_OP, 0b001, 0b0000000));
    instructions.push(r_type("slt", OPC_OP, 0b010, 0b0000000));
    instructions.push(r_type("sltu", OPC_OP, 0b011, 0b0000000));
    instructions.push(r_type("xor", OPC_OP, 0b100, 0b0000000));
    instructions.push(r_type("srl", OPC_OP, 0b101, 0b0000000));
    instructions.push(r_type("sra", OPC_OP, 0b101, 0b0100000));
    instructions.push(r_type("or", OPC_OP, 0b110, 0b0000000));
    instructions.push(r_type("and", OPC_OP, 0b111, 0b0000000));

    instructions.push(b_type("beq", 0b000));
    instructions.push(b_type("bne", 0b001));
    instructions.push(b_type("blt", 0b100));
    instructions.push(b_type("bge", 0b101));
    instructions.push(b_type("bltu", 0b110));
    instructions.push(b_type("bgeu", 0b111));

    if rv64 {
        instructions.push(load_type("lwu", 0b110));
        instructions.push(load_type("ld", 0b011));
        instructions.push(s_type("sd", 0b011));
        instructions.push(i_type("addiw", OPC_OPIMM32, 0b000));
        instructions.push(r_type("addw", OPC_OP32, 0b000, 0b0000000));
        instructions.push(r_type("subw", OPC_OP32, 0b000, 0b0100000));
        instructions.push(r_type("sllw", OPC_OP32, 0b001, 0b0000000));
        instructions.push(r_type("srlw", OPC_OP32, 0b101, 0b0000000));
        instructions.push(r_type("sraw", OPC_OP32, 0b101, 0b0100000));
    }
}

fn enable_pseudos(rv64: bool, pseudos: &mut Vec<PseudoInstruction>) {
    pseudos.push(pseudo_load("lb"));
    pseudos.push(pseudo_load("lh"));
    pseudos.push(pseudo_load("lw"));
    pseudos.push(pseudo_store("sb"));
    pseudos.push(pseudo_store("sh"));
    pseudos.push(pseudo_store("sw"));
    if rv64 {
        pseudos.push(pseudo_load("ld"));
        pseudos.push(pseudo_store("sd"));
    }

    pseudos.push(PseudoInstruction::new(
        "la",
        vec![Reg, Imm],
        Box::new(|line, _| {
            let rd = &line.tokens[1];
            let target = &line.tokens[2];
            Ok(vec![
                vec![
                    Token::new("auipc"),
                    rd.clone(),
                    Token::with_relocation(target.value.clone(), "%pcrel_hi"),
                ],
                vec![
                    Token::new("addi"),
                    rd.clone(),
                    rd.clone(),
                    Token::with_relocation(format!("({} + 4)", target.value), "%pcrel_lo"),
                ],
            ])
        }),
    ));

    pseudos.push(PseudoInstruction::new(
        "call",
        vec![Imm],
        Box::new(|line, _| {
            let target = &line.tokens[1];
            Ok(vec![
                vec![
                    Token::new("auipc"),
                    Token::new("x1"),
                    Token::with_relocation(target.value.clone(), "%pcrel_hi"),
                ],
                vec![
                    Token::new("jalr"),
                    Token::new("x1"),
                    Token::new("x1"),
                    Token::with_relocation(format!("({} + 4)", target.value), "%pcrel_lo"),
                ],
            ])
        }),
    ));

    pseudos.push(PseudoInstruction::new(
        "tail",
        vec![Imm],
        Box::new(|line, _| {
            let target = &line.tokens[1];
            Ok(vec![
                vec![
                    Token::new("auipc"),
                    Token::new("x6"),
                    Token::with_relocation(target.value.clone(), "%pcrel_hi"),
                ],
                vec![
                    Token::new("jalr"),
                    Token::new("x0"),
                    Token::new("x6"),
                    Token::with_relocation(format!("({} + 4)", target.value), "%pcrel_lo"),
                ],
            ])
        }),
    ));

    pseudos.push(simple("j", vec![Imm], |t| {
        vec![vec![Token::new("jal"), Token::new("x0"), t[1].clone()]]
    }));
    pseudos.push(simple("jr", vec![Reg], |t| {
        vec![vec![
            Token::new("jalr"),
            Token::new("x0"),
            t[1].clone(),
            Token::new("0"),
        ]]
    }));
    pseudos.push(simple("jalr", vec![Reg], |t| {
        vec![vec![
            Token::new("jalr"),
            Token::new("x1"),
            t[1].clone(),
            Token::new("0"),
        ]]
    }));
    pseudos.push(simple("ret", vec![], |_| {
        vec![vec![
            Token::new("jalr"),
            Token::new("x0"),
            Token::new("x1"),
            Token::new("0"),
        ]]
    }));
    pseudos.push(simple("jal", vec![Imm], |t| {
        vec![vec![Token::new("jal"), Token::new("x1"), t[1].clone()]]
    }));
    pseudos.push(simple("nop", vec![], |_| {
        vec![vec![
            Token::new("addi"),
            Token::new("x0"),
            Token::new("x0"),
            Token::new("0"),
        ]]
    }));
    pseudos.push(simple("mv", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("addi"),
            t[1].clone(),
            t[2].clone(),
            Token::new("0"),
        ]]
    }));
    pseudos.push(simple("not", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("xori"),
            t[1].clone(),
            t[2].clone(),
            Token::new("-1"),
        ]]
    }));
    pseudos.push(simple("neg", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("sub"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("seqz", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("sltiu"),
            t[1].clone(),
            t[2].clone(),
            Token::new("1"),
        ]]
    }));
    pseudos.push(simple("snez", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("sltu"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("sltz", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("slt"),
            t[1].clone(),
            t[2].clone(),
            Token::new("x0"),
        ]]
    }));
    pseudos.push(simple("sgtz", vec![Reg, Reg], |t| {
        vec![vec![
            Token::new("slt"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));

    pseudos.push(simple("beqz", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("beq"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("bnez", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("bne"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("blez", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("bge"),
            Token::new("x0"),
            t[1].clone(),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("bgez", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("bge"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("bltz", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("blt"),
            t[1].clone(),
            Token::new("x0"),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("bgtz", vec![Reg, Imm], |t| {
        vec![vec![
            Token::new("blt"),
            Token::new("x0"),
            t[1].clone(),
            t[2].clone(),
        ]]
    }));
    pseudos.push(simple("bgt", vec![Reg, Reg, Imm], |t| {
        vec![vec![
            Token::new("blt"),
            t[2].clone(),
            t[1].clone(),
            t[3].clone(),
        ]]
    }));
    pseudos.push(simple("ble", vec![Reg, Reg, Imm], |t| {
        vec![vec![
            Token::new("bge"),
            t[2].clone(),
            t[1].clone(),
            t[3].clone(),
        ]]
    }));
    pseudos.push(simple("bgtu", vec![Reg, Reg, Imm], |t| {
        vec![vec![
            Token::new("bltu"),
            t[2].clone(),
            t[1].clone(),
            t[3].clone(),
        ]]
    }));
    pseudos.push(simple("bleu", vec![Reg, Reg, Imm], |t| {
        vec![vec![
            Token::new("bgeu"),
            t[2].clone(),
            t[1].clone(),
            t[3].clone(),
        ]]
    }));

    pseudos.push(li_pseudo(rv64));
}

fn simple(
    name: &str,
    signature: Vec<crate::isa::pseudo::PseudoTokenKind>,
    rewrite: fn(&[Token]) -> Vec<Vec<Token>>,
) -> PseudoInstruction {
    PseudoInstruction::new(name, signature, Box::new(move |line, _| Ok(rewrite(&line.tokens))))
}

/// The load-immediate expander follows the LLVM materialization sequence:
/// a `lui`/`addi[w]` pair for 32-bit values, recursively extended with
/// `slli`/`addi` steps for wider RV64 constants.
fn li_pseudo(rv64: bool) -> PseudoInstruction {
    PseudoInstruction::new(
        "li",
        vec![Reg, Imm],
        Box::new(move |line, symbols| {
            let token = &line.tokens[2];
            let value = match parse_immediate_sext32(&token.value) {
                Some(value) => value,
                // The immediate may be a symbol that is already known at
                // expansion time (e.g. seeded from a previous assembly).
                None => match symbols.get(&token.value) {
                    Some(value) => value as i64,
                    None => {
                        return Err(AssemblyError::BadImmediate {
                            line: line.location.line,
                            token: token.value.clone(),
                            reason: "not an integer literal or known symbol".to_string(),
                        });
                    }
                },
            };
            let mut lines = Vec::new();
            li_sequence(&mut lines, line, value, rv64, false)?;
            Ok(lines)
        }),
    )
}

fn li_sequence(
    out: &mut Vec<Vec<Token>>,
    line: &TokenizedLine,
    value: i64,
    rv64: bool,
    mut live_dst: bool,
) -> Result<bool, AssemblyError> {
    let rd = &line.tokens[1];
    if fits_signed(value, 32) || (!rv64 && fits_unsigned(value, 32)) {
        let hi20 = (value.wrapping_add(0x800) >> 12) & 0xFFFFF;
        let lo12 = sign_extend(value, 12);
        if hi20 != 0 {
            out.push(vec![
                Token::new("lui"),
                rd.clone(),
                Token::new(hi20.to_string()),
            ]);
            live_dst = true;
        }
        if lo12 != 0 || hi20 == 0 {
            let mnemonic = if rv64 && hi20 != 0 { "addiw" } else { "addi" };
            let src = if live_dst { rd.clone() } else { Token::new("x0") };
            out.push(vec![
                Token::new(mnemonic),
                rd.clone(),
                src,
                Token::new(lo12.to_string()),
            ]);
            live_dst = true;
        }
        return Ok(live_dst);
    }

    if !rv64 {
        return Err(AssemblyError::ImmediateOutOfRange {
            line: line.location.line,
            token: line.tokens[2].value.clone(),
            width: 32,
            repr: Repr::Signed,
        });
    }

    let lo12 = sign_extend(value, 12);
    let hi52 = ((value as u64).wrapping_add(0x800)) >> 12;
    let shift = 12 + hi52.trailing_zeros();
    let upper = sign_extend((hi52 >> (shift - 12)) as i64, 64 - shift);
    li_sequence(out, line, upper, rv64, live_dst)?;
    out.push(vec![
        Token::new("slli"),
        line.tokens[1].clone(),
        line.tokens[1].clone(),
        Token::new(shift.to_string()),
    ]);
    if lo12 != 0 {
        out.push(vec![
            Token::new("addi"),
            line.tokens[1].clone(),
            line.tokens[1].clone(),
            Token::new(lo12.to_string()),
        ]);
    }
    Ok(true)
}
