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

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TEXT_SECTION: &str = ".text";
pub const DATA_SECTION: &str = ".data";
pub const BSS_SECTION: &str = ".bss";

/// A named, contiguous block of assembled bytes placed at a fixed base
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgramSection {
    pub name: String,
    pub address: u64,
    pub data: Vec<u8>,
}

/// An assembled program, ready to be loaded into simulator memory.
///
/// The `.text` section holds the program's instructions; other sections hold
/// its data. All maps are ordered so that two assemblies of the same source
/// produce byte-for-byte identical programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Program {
    pub entry_point: u64,
    pub sections: BTreeMap<String, ProgramSection>,
    /// Absolute address → symbol name, for address-typed symbols only.
    pub symbols: BTreeMap<u64, String>,
    /// Offset within `.text` → source line indices that produced the bytes.
    pub source_mapping: BTreeMap<u64, BTreeSet<usize>>,
    pub source_hash: Option<String>,
}

impl Program {
    pub fn section(&self, name: &str) -> Option<&ProgramSection> {
        self.sections.get(name)
    }

    pub fn text(&self) -> Option<&ProgramSection> {
        self.section(TEXT_SECTION)
    }
}
