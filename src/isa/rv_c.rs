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

//! C extension: the 16-bit CA-format register-register instructions.
//! Enabling this extension also drops the instruction byte alignment to 2.

use crate::isa::Isa;
use crate::isa::formats::ca_type;
use crate::isa::instruction::Instruction;
use crate::isa::pseudo::PseudoInstruction;
use std::sync::Arc;

pub(crate) fn enable(
    _isa: &Isa,
    instructions: &mut Vec<Arc<Instruction>>,
    _pseudos: &mut Vec<PseudoInstruction>,
) {
    instructions.push(ca_type("c.and", 0b11, 0b100011));
    instructions.push(ca_type("c.or", 0b10, 0b100011));
    instructions.push(ca_type("c.xor", 0b01, 0b100011));
    instructions.push(ca_type("c.sub", 0b00, 0b100011));
    instructions.push(ca_type("c.subw", 0b00, 0b100111));
    instructions.push(ca_type("c.addw", 0b01, 0b100111));
}
