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

//! M extension: integer multiplication and division.

use crate::isa::formats::{OPC_OP, OPC_OP32, r_type};
use crate::isa::instruction::Instruction;
use crate::isa::pseudo::PseudoInstruction;
use crate::isa::{Isa, Xlen};
use std::sync::Arc;

const FUNCT7_MULDIV: u32 = 0b0000001;

pub(crate) fn enable(
    isa: &Isa,
    instructions: &mut Vec<Arc<Instruction>>,
    _pseudos: &mut Vec<PseudoInstruction>,
) {
    instructions.push(r_type("mul", OPC_OP, 0b000, FUNCT7_MULDIV));
    instructions.push(r_type("mulh", OPC_OP, 0b001, FUNCT7_MULDIV));
    instructions.push(r_type("mulhsu", OPC_OP, 0b010, FUNCT7_MULDIV));
    instructions.push(r_type("mulhu", OPC_OP, 0b011, FUNCT7_MULDIV));
    instructions.push(r_type("div", OPC_OP, 0b100, FUNCT7_MULDIV));
    instructions.push(r_type("divu", OPC_OP, 0b101, FUNCT7_MULDIV));
    instructions.push(r_type("rem", OPC_OP, 0b110, FUNCT7_MULDIV));
    instructions.push(r_type("remu", OPC_OP, 0b111, FUNCT7_MULDIV));

    if isa.xlen() == Xlen::Rv64 {
        instructions.push(r_type("mulw", OPC_OP32, 0b000, FUNCT7_MULDIV));
        instructions.push(r_type("divw", OPC_OP32, 0b100, FUNCT7_MULDIV));
        instructions.push(r_type("divuw", OPC_OP32, 0b101, FUNCT7_MULDIV));
        instructions.push(r_type("remw", OPC_OP32, 0b110, FUNCT7_MULDIV));
        instructions.push(r_type("remuw", OPC_OP32, 0b111, FUNCT7_MULDIV));
    }
}
