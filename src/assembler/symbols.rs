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

use crate::errors::AssemblyError;
use crate::location::Location;
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// The symbol names a position in a program section.
    Address,
    /// The symbol names a plain value, e.g. one seeded from a previous
    /// assembly or from the simulator environment.
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn address(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Address,
        }
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Constant,
        }
    }

    /// A name is legal when it is all digits (a numeric local label) or
    /// starts with a letter, underscore or dot followed by letters, digits,
    /// underscores or dots.
    pub fn is_legal(&self) -> bool {
        let bytes = self.name.as_bytes();
        if bytes.is_empty() {
            return false;
        }
        if bytes.iter().all(u8::is_ascii_digit) {
            return true;
        }
        let head_ok = bytes[0].is_ascii_alphabetic() || bytes[0] == b'_' || bytes[0] == b'.';
        head_ok
            && bytes[1..]
                .iter()
                .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
    }

    /// Local symbols (`.L…` prefixed or numeric) may shadow across lines;
    /// every other symbol has at most one definition.
    pub fn is_local(&self) -> bool {
        self.name.starts_with(".L") || self.name.bytes().all(|b| b.is_ascii_digit())
    }
}

#[derive(Debug, Clone)]
struct SymbolEntry {
    value: u64,
    kind: SymbolKind,
    local: bool,
}

/// Name → value mapping built during pass 2 and read during pass 3.
///
/// Backed by a `BTreeMap` so that iteration order, and with it assembler
/// output, is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    entries: BTreeMap<String, SymbolEntry>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|e| e.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Records a symbol definition. Redefining a non-local symbol is an
    /// error; local symbols shadow earlier definitions.
    pub fn insert(
        &mut self,
        symbol: &Symbol,
        value: u64,
        location: Location,
    ) -> Result<(), AssemblyError> {
        let local = symbol.is_local();
        if !local && self.entries.contains_key(&symbol.name) {
            return Err(AssemblyError::RedefinedSymbol {
                line: location.line,
                name: symbol.name.clone(),
            });
        }
        self.entries.insert(
            symbol.name.clone(),
            SymbolEntry {
                value,
                kind: symbol.kind,
                local,
            },
        );
        Ok(())
    }

    /// Unconditionally (re)defines a symbol. Used for the synthetic
    /// `__address__` symbol and for seeding external constants.
    pub fn define(&mut self, name: impl Into<String>, value: u64, kind: SymbolKind) {
        let name = name.into();
        let local = Symbol {
            name: name.clone(),
            kind,
        }
        .is_local();
        self.entries.insert(name, SymbolEntry { value, kind, local });
    }

    /// Address-typed symbols in name order, for the program's reverse symbol
    /// table.
    pub fn addresses(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.kind == SymbolKind::Address)
            .map(|(name, e)| (name.as_str(), e.value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
