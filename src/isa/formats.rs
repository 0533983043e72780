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

//! RISC-V base opcodes and the shared instruction-format constructors
//! (R/I/S/B/U/J, shift-immediate and compressed CA formats).

use crate::isa::instruction::{Field, ImmPart, ImmSymbolKind, Instruction, OpPart, Repr};
use std::sync::Arc;

pub const OPC_LUI: u32 = 0b0110111;
pub const OPC_AUIPC: u32 = 0b0010111;
pub const OPC_JAL: u32 = 0b1101111;
pub const OPC_JALR: u32 = 0b1100111;
pub const OPC_BRANCH: u32 = 0b1100011;
pub const OPC_LOAD: u32 = 0b0000011;
pub const OPC_STORE: u32 = 0b0100011;
pub const OPC_OPIMM: u32 = 0b0010011;
pub const OPC_OP: u32 = 0b0110011;
pub const OPC_OPIMM32: u32 = 0b0011011;
pub const OPC_OP32: u32 = 0b0111011;
pub const OPC_SYSTEM: u32 = 0b1110011;

/// All RISC-V base opcodes occupy the 7 LSBs of the instruction.
pub const fn opcode(value: u32) -> OpPart {
    OpPart::new(value, 0, 6)
}

/// Funct3 opcode parts sit in bits 12-14.
pub const fn funct3(value: u32) -> OpPart {
    OpPart::new(value, 12, 14)
}

/// Funct6 opcode parts sit in bits 26-31.
pub const fn funct6(value: u32) -> OpPart {
    OpPart::new(value, 26, 31)
}

/// Funct7 opcode parts sit in bits 25-31.
pub const fn funct7(value: u32) -> OpPart {
    OpPart::new(value, 25, 31)
}

pub fn reg_rd(token_idx: usize) -> Field {
    Field::reg(token_idx, 7, 11, "rd")
}

pub fn reg_rs1(token_idx: usize) -> Field {
    Field::reg(token_idx, 15, 19, "rs1")
}

pub fn reg_rs2(token_idx: usize) -> Field {
    Field::reg(token_idx, 20, 24, "rs2")
}

/// I-type immediate: Imm[11:0] = Inst[31:20], sign-extended.
pub fn imm_i(token_idx: usize) -> Field {
    Field::imm(
        token_idx,
        12,
        Repr::Signed,
        vec![ImmPart::new(0, 20, 31)],
        ImmSymbolKind::None,
    )
}

/// S-type immediate: Imm[11:5] = Inst[31:25], Imm[4:0] = Inst[11:7].
pub fn imm_s() -> Field {
    Field::imm(
        2,
        12,
        Repr::Signed,
        vec![ImmPart::new(5, 25, 31), ImmPart::new(0, 7, 11)],
        ImmSymbolKind::None,
    )
}

/// B-type immediate: 13-bit signed branch offset with Imm[0] = 0.
pub fn imm_b() -> Field {
    Field::imm(
        3,
        13,
        Repr::Signed,
        vec![
            ImmPart::new(12, 31, 31),
            ImmPart::new(11, 7, 7),
            ImmPart::new(5, 25, 30),
            ImmPart::new(1, 8, 11),
        ],
        ImmSymbolKind::Relative,
    )
}

/// U-type immediate: Imm[19:0] = Inst[31:12].
pub fn imm_u(symbol_kind: ImmSymbolKind) -> Field {
    Field::imm(
        2,
        32,
        Repr::Hex,
        vec![ImmPart::new(0, 12, 31)],
        symbol_kind,
    )
}

/// J-type immediate: 21-bit signed jump offset with Imm[0] = 0.
pub fn imm_j() -> Field {
    Field::imm(
        2,
        21,
        Repr::Signed,
        vec![
            ImmPart::new(20, 31, 31),
            ImmPart::new(12, 12, 19),
            ImmPart::new(11, 20, 20),
            ImmPart::new(1, 21, 30),
        ],
        ImmSymbolKind::Relative,
    )
}

pub fn r_type(name: &str, opc: u32, f3: u32, f7: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc), funct3(f3), funct7(f7)],
        vec![reg_rd(1), reg_rs1(2), reg_rs2(3)],
    ))
}

pub fn i_type(name: &str, opc: u32, f3: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc), funct3(f3)],
        vec![reg_rd(1), reg_rs1(2), imm_i(3)],
    ))
}

/// Loads read `rd, imm(rs1)`: the base register is token 3, the offset
/// token 2.
pub fn load_type(name: &str, f3: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(OPC_LOAD), funct3(f3)],
        vec![reg_rd(1), Field::reg(3, 15, 19, "rs1"), imm_i(2)],
    ))
}

/// Stores read `rs2, imm(rs1)`.
pub fn s_type(name: &str, f3: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(OPC_STORE), funct3(f3)],
        vec![Field::reg(3, 15, 19, "rs1"), imm_s(), Field::reg(1, 20, 24, "rs2")],
    ))
}

pub fn b_type(name: &str, f3: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(OPC_BRANCH), funct3(f3)],
        vec![reg_rs1(1), Field::reg(2, 20, 24, "rs2"), imm_b()],
    ))
}

pub fn u_type(name: &str, opc: u32, symbol_kind: ImmSymbolKind) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc)],
        vec![reg_rd(1), imm_u(symbol_kind)],
    ))
}

pub fn j_type(name: &str, opc: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc)],
        vec![reg_rd(1), imm_j()],
    ))
}

pub fn jalr_type(name: &str) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(OPC_JALR), funct3(0b000)],
        vec![reg_rd(1), reg_rs1(2), imm_i(3)],
    ))
}

/// Shift-immediate with a 5-bit shamt and a funct7 discriminator
/// (RV32 shifts, and the `…w` shifts on RV64).
pub fn ishift32_type(name: &str, opc: u32, f3: u32, f7: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc), funct3(f3), funct7(f7)],
        vec![
            reg_rd(1),
            reg_rs1(2),
            Field::imm(
                3,
                5,
                Repr::Unsigned,
                vec![ImmPart::new(0, 20, 24)],
                ImmSymbolKind::None,
            ),
        ],
    ))
}

/// Shift-immediate with a 6-bit shamt and a funct6 discriminator (RV64).
pub fn ishift64_type(name: &str, opc: u32, f3: u32, f6: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![opcode(opc), funct3(f3), funct6(f6)],
        vec![
            reg_rd(1),
            reg_rs1(2),
            Field::imm(
                3,
                6,
                Repr::Unsigned,
                vec![ImmPart::new(0, 20, 25)],
                ImmSymbolKind::None,
            ),
        ],
    ))
}

/// Compressed CA-format: 16-bit word, quadrant 01, 3-bit register fields
/// addressing `x8..x15`.
pub fn ca_type(name: &str, f2: u32, f6: u32) -> Arc<Instruction> {
    Arc::new(Instruction::new(
        name,
        vec![
            OpPart::new(0b01, 0, 1),
            OpPart::new(f2, 5, 6),
            OpPart::new(f6, 10, 15),
        ],
        vec![Field::reg(1, 7, 9, "rd'/rs1'"), Field::reg(2, 2, 4, "rs2'")],
    ))
}
