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

//! RISC-V assembly engine for an educational simulator.
//!
//! The crate assembles RV32I/RV64I source (plus the M and C extensions) into
//! binary [`Program`] sections and disassembles them back into text. The
//! pipeline is a classic four-pass design: tokenize, pseudo-instruction
//! expansion, encoding, and symbol linking. Construction of an [`Assembler`]
//! fixes the ISA, the section base addresses and the instruction tables;
//! every `assemble` call is then a pure function of its source text.
//!
//! ```
//! use rvasm::assembler::{Assembler, AssemblerOptions};
//! use rvasm::isa::Isa;
//!
//! let asm = Assembler::new(Isa::rv32i(&[]), AssemblerOptions::default()).unwrap();
//! let program = asm.assemble("addi x1, x0, 5\n").unwrap();
//! assert_eq!(program.text().unwrap().data, vec![0x93, 0x00, 0x50, 0x00]);
//! ```

pub mod assembler;
pub mod errors;
pub mod expr;
pub mod isa;
pub mod location;
pub mod numeric;
pub mod parser;
pub mod program;

pub use assembler::{Assembler, AssemblerOptions, DisassembleResult, OpDisassembleResult};
pub use errors::AssemblyError;
pub use isa::Isa;
pub use program::{Program, ProgramSection};
