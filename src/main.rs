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

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rvasm::assembler::{Assembler, AssemblerOptions};
use rvasm::isa::Isa;
use rvasm::program::{Program, ProgramSection, TEXT_SECTION};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(version, about = "RISC-V assembler for the simulator frontend")]
struct Opts {
    #[clap(short, long)]
    input: PathBuf,
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Base ISA
    #[clap(long, value_enum, default_value = "rv32i")]
    isa: IsaArg,
    /// Enabled extensions, e.g. "MC"
    #[clap(long, default_value = "")]
    ext: String,
    /// Base address of the .text section
    #[clap(long)]
    text_start: Option<u64>,
    /// Base address of the .data section
    #[clap(long)]
    data_start: Option<u64>,
    /// Base address of the .bss section
    #[clap(long)]
    bss_start: Option<u64>,
    /// Output format for assembled programs
    #[clap(long, value_enum, default_value = "bin")]
    format: Format,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Disassemble a flat binary (.text image) instead of assembling source
    Disassemble,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum IsaArg {
    Rv32i,
    Rv64i,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Flat binary image of the .text section
    Bin,
    /// JSON dump of the full program (sections, symbols, source mapping)
    Json,
}

fn build_assembler(opts: &Opts) -> Result<Assembler> {
    let extensions: Vec<char> = opts.ext.chars().collect();
    for ext in &extensions {
        if !matches!(ext, 'M' | 'C' | 'A' | 'F' | 'D') {
            bail!("unsupported extension '{ext}' (expected a subset of MCAFD)");
        }
    }
    let isa = match opts.isa {
        IsaArg::Rv32i => Isa::rv32i(&extensions),
        IsaArg::Rv64i => Isa::rv64i(&extensions),
    };
    let defaults = AssemblerOptions::default();
    let options = AssemblerOptions {
        text_start: opts.text_start.unwrap_or(defaults.text_start),
        data_start: opts.data_start.unwrap_or(defaults.data_start),
        bss_start: opts.bss_start.unwrap_or(defaults.bss_start),
        comment_char: defaults.comment_char,
    };
    Ok(Assembler::new(isa, options)?)
}

fn assemble(opts: &Opts, assembler: &Assembler) -> Result<()> {
    let source = fs::read_to_string(&opts.input)
        .with_context(|| format!("failed to read input file: {}", opts.input.display()))?;

    let program = match assembler.assemble(&source) {
        Ok(program) => program,
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            bail!("assembly failed with {} error(s)", errors.len());
        }
    };

    match opts.format {
        Format::Bin => {
            let text = program
                .text()
                .map(|section| section.data.clone())
                .unwrap_or_default();
            match &opts.output {
                Some(path) => fs::write(path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => bail!("binary output requires --output"),
            }
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(&program)?;
            match &opts.output {
                Some(path) => fs::write(path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}

fn disassemble(opts: &Opts, assembler: &Assembler) -> Result<()> {
    let data = fs::read(&opts.input)
        .with_context(|| format!("failed to read input file: {}", opts.input.display()))?;

    let base = opts
        .text_start
        .unwrap_or(AssemblerOptions::default().text_start);
    let mut program = Program::default();
    program.entry_point = base;
    program.sections.insert(
        TEXT_SECTION.to_string(),
        ProgramSection {
            name: TEXT_SECTION.to_string(),
            address: base,
            data,
        },
    );

    let mut listing = String::new();
    let section = program.text().expect("text section just inserted");
    let alignment = assembler.isa().instr_byte_alignment() as usize;
    let mut offset = 0usize;
    while offset + alignment <= section.data.len() {
        let mut word = 0u32;
        for (i, byte) in section.data[offset..].iter().take(4).enumerate() {
            word |= (*byte as u32) << (8 * i);
        }
        let addr = base + offset as u64;
        let decoded = assembler.disassemble_word(word, &program.symbols, addr);
        listing.push_str(&format!("{addr:#010x}: {}\n", decoded.text));
        offset += decoded.bytes_consumed;
    }

    match &opts.output {
        Some(path) => {
            fs::write(path, listing).with_context(|| format!("failed to write {}", path.display()))?
        }
        None => print!("{listing}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let assembler = build_assembler(&opts)?;

    match &opts.command {
        Some(Commands::Disassemble) => disassemble(&opts, &assembler)?,
        None => assemble(&opts, &assembler)?,
    }
    Ok(())
}
