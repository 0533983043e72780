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

use crate::isa::instruction::Repr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Syntax error on line {line}: {reason}")]
    SyntaxError { line: usize, reason: String },

    #[error("Illegal symbol '{name}' on line {line}")]
    IllegalSymbol { line: usize, name: String },

    #[error("Multiple definitions of symbol '{name}' on line {line}")]
    RedefinedSymbol { line: usize, name: String },

    #[error("Unknown opcode '{mnemonic}' on line {line}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("Unknown directive '{name}' on line {line}")]
    UnknownDirective { line: usize, name: String },

    #[error("Invalid argument for directive '{directive}' on line {line}: {reason}")]
    BadDirectiveArg {
        line: usize,
        directive: String,
        reason: String,
    },

    #[error("Invalid register '{token}' on line {line}")]
    BadRegister { line: usize, token: String },

    #[error("Invalid immediate '{token}' on line {line}: {reason}")]
    BadImmediate {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("Immediate '{token}' on line {line} does not fit in a {width}-bit {repr} field")]
    ImmediateOutOfRange {
        line: usize,
        token: String,
        width: u32,
        repr: Repr,
    },

    #[error("'{mnemonic}' on line {line} expects {expected} operands, found {found}")]
    WrongOperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("Unresolved symbol '{name}' in expression '{expression}' on line {line}")]
    UnresolvedSymbol {
        line: usize,
        name: String,
        expression: String,
    },

    #[error("Relocation {relocation} value {value:#x} out of range on line {line}")]
    RelocationOverflow {
        line: usize,
        relocation: String,
        value: i64,
    },

    #[error("Relocation applied to non-immediate operand '{token}' on line {line}")]
    BadRelocationTarget { line: usize, token: String },

    #[error(
        "Instruction misaligned at offset {offset:#x} on line {line}: \
         must be emitted on a {required}-byte boundary"
    )]
    Misaligned {
        line: usize,
        offset: u64,
        required: u32,
    },

    #[error("Unknown instruction word {word:#010x}")]
    UnknownInstruction { word: u32 },

    #[error("Instructions '{first}' and '{second}' cannot be told apart when decoding")]
    AmbiguousEncoding { first: String, second: String },

    /// Internal marker used by the pseudo-instruction expander to signal that
    /// a line should fall through to ordinary instruction handling. Never
    /// reported to users.
    #[error("not a pseudo instruction")]
    NotAPseudoOp,
}

impl AssemblyError {
    /// Source line index the error refers to, when it has one.
    pub fn line(&self) -> Option<usize> {
        use AssemblyError::*;
        match self {
            SyntaxError { line, .. }
            | IllegalSymbol { line, .. }
            | RedefinedSymbol { line, .. }
            | UnknownOpcode { line, .. }
            | UnknownDirective { line, .. }
            | BadDirectiveArg { line, .. }
            | BadRegister { line, .. }
            | BadImmediate { line, .. }
            | ImmediateOutOfRange { line, .. }
            | WrongOperandCount { line, .. }
            | UnresolvedSymbol { line, .. }
            | RelocationOverflow { line, .. }
            | BadRelocationTarget { line, .. }
            | Misaligned { line, .. } => Some(*line),
            UnknownInstruction { .. } | AmbiguousEncoding { .. } | NotAPseudoOp => None,
        }
    }
}
