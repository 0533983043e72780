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

//! GNU-style directive dispatch: section control and data emission.

use crate::errors::AssemblyError;
use crate::location::TokenizedLine;
use crate::numeric::{fits_signed, fits_unsigned, parse_immediate};
use crate::program::{BSS_SECTION, DATA_SECTION, TEXT_SECTION};

/// What executing a directive does to the current pass-2 state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveEffect {
    SwitchSection(&'static str),
    Emit(Vec<u8>),
}

/// Directives that affect section layout and are executed in-place during
/// pass 0, before any bytes are emitted.
pub fn is_early(name: &str) -> bool {
    matches!(name, ".text" | ".data" | ".bss")
}

pub fn execute(name: &str, line: &TokenizedLine) -> Result<DirectiveEffect, AssemblyError> {
    match name {
        ".text" => Ok(DirectiveEffect::SwitchSection(TEXT_SECTION)),
        ".data" => Ok(DirectiveEffect::SwitchSection(DATA_SECTION)),
        ".bss" => Ok(DirectiveEffect::SwitchSection(BSS_SECTION)),
        ".byte" => emit_data(name, line, 1),
        ".half" | ".short" | ".2byte" => emit_data(name, line, 2),
        ".word" | ".long" | ".4byte" => emit_data(name, line, 4),
        ".zero" => emit_zero(name, line),
        ".string" | ".asciz" => emit_string(name, line),
        _ => Err(AssemblyError::UnknownDirective {
            line: line.location.line,
            name: name.to_string(),
        }),
    }
}

fn bad_arg(name: &str, line: &TokenizedLine, reason: impl Into<String>) -> AssemblyError {
    AssemblyError::BadDirectiveArg {
        line: line.location.line,
        directive: name.to_string(),
        reason: reason.into(),
    }
}

/// Emits one little-endian value of `width` bytes per argument.
fn emit_data(
    name: &str,
    line: &TokenizedLine,
    width: u32,
) -> Result<DirectiveEffect, AssemblyError> {
    if line.tokens.is_empty() {
        return Err(bad_arg(name, line, "expected at least one value"));
    }
    let mut bytes = Vec::with_capacity(line.tokens.len() * width as usize);
    for token in &line.tokens {
        let value = parse_immediate(&token.value)
            .ok_or_else(|| bad_arg(name, line, format!("invalid value '{}'", token.value)))?;
        let bits = width * 8;
        if !fits_signed(value, bits) && !fits_unsigned(value, bits) {
            return Err(bad_arg(
                name,
                line,
                format!("value '{}' does not fit in {width} bytes", token.value),
            ));
        }
        for i in 0..width {
            bytes.push((value >> (8 * i)) as u8);
        }
    }
    Ok(DirectiveEffect::Emit(bytes))
}

fn emit_zero(name: &str, line: &TokenizedLine) -> Result<DirectiveEffect, AssemblyError> {
    if line.tokens.len() != 1 {
        return Err(bad_arg(name, line, "expected exactly one size argument"));
    }
    let count = parse_immediate(&line.tokens[0].value)
        .filter(|count| *count >= 0)
        .ok_or_else(|| bad_arg(name, line, "expected a non-negative size"))?;
    Ok(DirectiveEffect::Emit(vec![0u8; count as usize]))
}

/// Emits the UTF-8 bytes of a quoted string with a trailing NUL byte.
fn emit_string(name: &str, line: &TokenizedLine) -> Result<DirectiveEffect, AssemblyError> {
    if line.tokens.len() != 1 {
        return Err(bad_arg(name, line, "expected exactly one string argument"));
    }
    let raw = &line.tokens[0].value;
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| bad_arg(name, line, "expected a quoted string"))?;

    let mut bytes = Vec::with_capacity(inner.len() + 1);
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('0') => bytes.push(0),
            Some('\\') => bytes.push(b'\\'),
            Some('"') => bytes.push(b'"'),
            other => {
                return Err(bad_arg(
                    name,
                    line,
                    format!("unsupported escape '\\{}'", other.map(String::from).unwrap_or_default()),
                ));
            }
        }
    }
    bytes.push(0);
    Ok(DirectiveEffect::Emit(bytes))
}
