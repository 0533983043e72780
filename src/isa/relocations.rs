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

//! The supported relocations: transformations applied to a resolved symbol
//! value before it is inserted into an immediate field.

use crate::numeric::sign_extend;

/// A named relocation. The handler receives the evaluated symbol value and
/// the address of the instruction being patched.
#[derive(Clone, Copy)]
pub struct Relocation {
    name: &'static str,
    handler: fn(value: i64, reloc_addr: u64) -> i64,
}

impl Relocation {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handle(&self, value: i64, reloc_addr: u64) -> i64 {
        (self.handler)(value, reloc_addr)
    }
}

/// The pcrel pair is restricted to 32-bit absolute addresses, so all of its
/// arithmetic stays in that base.
fn pcrel_hi20(value: u32, reloc_addr: u32) -> u32 {
    value
        .wrapping_sub(reloc_addr % 0xFFFF_F000)
        .wrapping_add(0x800)
        >> 12
}

fn rv_hi(value: i64, _reloc_addr: u64) -> i64 {
    (((value as u32) >> 12) & 0xFFFFF) as i64
}

fn rv_lo(value: i64, _reloc_addr: u64) -> i64 {
    sign_extend((value as u32 & 0xFFF) as i64, 12)
}

fn rv_pcrel_hi(value: i64, reloc_addr: u64) -> i64 {
    pcrel_hi20(value as u32, reloc_addr as u32) as i64
}

fn rv_pcrel_lo(value: i64, reloc_addr: u64) -> i64 {
    let value = value as u32;
    let reloc_addr = reloc_addr as u32;
    let hi20 = pcrel_hi20(value, reloc_addr);
    let lo12 = value
        .wrapping_sub(reloc_addr % 0xFFFF_F000)
        .wrapping_sub(hi20 << 12);
    sign_extend(lo12 as i64, 12)
}

pub fn rv_relocations() -> Vec<Relocation> {
    vec![
        Relocation {
            name: "%pcrel_hi",
            handler: rv_pcrel_hi,
        },
        Relocation {
            name: "%pcrel_lo",
            handler: rv_pcrel_lo,
        },
        Relocation {
            name: "%hi",
            handler: rv_hi,
        },
        Relocation {
            name: "%lo",
            handler: rv_lo,
        },
    ]
}
